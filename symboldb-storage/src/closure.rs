//! ELF dependency closure over a package set.
//!
//! Every DT_NEEDED reference of a set member is resolved to the best DSO
//! providing that soname for the same architecture, then the dependency
//! relation is closed transitively and written to `elf_closure`.

use std::collections::{BTreeMap, BTreeSet};

use rusqlite::{params, Connection};
use rustc_hash::FxHashMap;
use symboldb_core::errors::StorageError;
use symboldb_core::types::{FileId, PackageSetId};

use crate::sqlite_err;

/// Observer for resolution problems. The default implementation ignores
/// everything; the CLI plugs in a reporting one.
pub trait ClosureConflicts {
    /// No provider for the soname was found.
    fn missing(&mut self, file: FileId, soname: &str) {
        let _ = (file, soname);
    }

    /// Several providers were found; `choices[0]` is the winner.
    fn conflict(&mut self, file: FileId, soname: &str, choices: &[FileId]) {
        let _ = (file, soname, choices);
    }

    /// Return true to compute conflicts only, without touching the table.
    fn skip_update(&self) -> bool {
        false
    }
}

/// The silent observer.
pub struct IgnoreConflicts;

impl ClosureConflicts for IgnoreConflicts {}

#[derive(Debug, Clone)]
struct FileRef {
    id: FileId,
    name: String,
    package: String,
}

impl FileRef {
    /// Heuristic rating of how well this provider matches the needing
    /// path. Higher is better.
    fn priority(&self, needed_path: &str) -> i64 {
        const LIB_PRIO: i64 = 100_000;
        const DIRECTORY_PRIO: i64 = 10_000;

        let mut prio = 0i64;
        // The standard library directories are strongly preferred.
        if self.name.starts_with("/lib/")
            || self.name.starts_with("/lib64/")
            || self.name.starts_with("/usr/lib/")
            || self.name.starts_with("/usr/lib64/")
        {
            prio += LIB_PRIO;
        }
        if same_directory(&self.name, needed_path) {
            prio += DIRECTORY_PRIO;
        }
        // Prefer libraries in the same file system area, with a shared
        // initial path.
        prio += 2 * self
            .name
            .bytes()
            .zip(needed_path.bytes())
            .take_while(|(a, b)| a == b)
            .count() as i64;
        // Deeply nested libraries are less preferred.
        prio -= self.name.len() as i64;
        prio
    }
}

/// True if both absolute paths refer to files in the same directory.
fn same_directory(left: &str, right: &str) -> bool {
    match (left.rfind('/'), right.rfind('/')) {
        (Some(l), Some(r)) => l == r && left[..l] == right[..r],
        _ => false,
    }
}

/// Sub-architecture and compatibility DSOs that should not count as
/// conflicting providers.
fn ignored_file_name(path: &str) -> bool {
    (path.starts_with("/lib/")
        && (path.starts_with("/lib/i686/nosegneg/")
            || (path.starts_with("/lib/rtkaio/")
                && (path.starts_with("/lib/rtkaio/librtkaio-")
                    || path.starts_with("/lib/rtkaio/i686/nosegneg/")))))
        || path.starts_with("/lib64/rtkaio/librtkaio-")
}

fn ignored_package_name(pkg: &str) -> bool {
    pkg == "compat-gcc-34-c++" || pkg == "compat-glibc"
}

type SonameMap = BTreeMap<String, Vec<FileRef>>;
type ArchSonameMap = BTreeMap<String, SonameMap>;

/// Drop ignorable providers from groups where exactly one non-ignored
/// provider would remain.
fn ignore_some_conflicts(arch_soname: &mut ArchSonameMap) {
    for soname_map in arch_soname.values_mut() {
        for providers in soname_map.values_mut() {
            let ignorable = providers
                .iter()
                .filter(|p| ignored_file_name(&p.name) || ignored_package_name(&p.package))
                .count();
            if ignorable + 1 == providers.len() {
                providers.retain(|p| {
                    !ignored_file_name(&p.name) && !ignored_package_name(&p.package)
                });
            }
        }
    }
}

/// Objects without a soname are addressed by their basename.
fn synthesize_soname(path: &str) -> String {
    match path.rfind('/') {
        Some(slash) => path[slash + 1..].to_string(),
        None => path.to_string(),
    }
}

fn lookup(
    arch_soname: &ArchSonameMap,
    arch: &str,
    needed_name: &str,
    needing_file: FileId,
    needing_path: &str,
    conflicts: &mut dyn ClosureConflicts,
) -> Option<FileId> {
    let providers = arch_soname.get(arch)?.get(needed_name)?;
    let first = providers.first()?;
    if providers.len() == 1 {
        return Some(first.id);
    }

    let mut best = first;
    let mut best_priority = best.priority(needing_path);
    for candidate in &providers[1..] {
        let prio = candidate.priority(needing_path);
        // On a file name tie, pick the lexicographically smaller package.
        if prio > best_priority
            || (candidate.name == best.name && candidate.package < best.package)
        {
            best = candidate;
            best_priority = prio;
        }
    }
    let mut choices = vec![best.id];
    choices.extend(providers.iter().map(|p| p.id).filter(|&id| id != best.id));
    conflicts.conflict(needing_file, needed_name, &choices);
    Some(best.id)
}

/// Recompute the ELF closure for a package set. Must run inside the
/// caller's transaction.
pub fn update_elf_closure(
    conn: &Connection,
    set: PackageSetId,
    conflicts: &mut dyn ClosureConflicts,
) -> Result<(), StorageError> {
    // Providers: DSOs (e_type == 3) in the set, keyed by arch and soname.
    let mut arch_soname: ArchSonameMap = BTreeMap::new();
    {
        let mut stmt = conn
            .prepare_cached(
                "SELECT COALESCE(ef.arch, ''), COALESCE(ef.soname, ''), f.file_id, f.name, p.name
                 FROM package_set_member psm
                 JOIN package p ON p.package_id = psm.package_id
                 JOIN file f ON f.package_id = p.package_id
                 JOIN elf_file ef ON ef.contents_id = f.contents_id
                 WHERE psm.set_id = ?1 AND ef.e_type = 3",
            )
            .map_err(sqlite_err)?;
        let rows = stmt
            .query_map(params![set.value()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(sqlite_err)?;
        for row in rows {
            let (arch, mut soname, fid, file_name, pkg) = row.map_err(sqlite_err)?;
            if soname.is_empty() {
                soname = synthesize_soname(&file_name);
            }
            arch_soname.entry(arch).or_default().entry(soname).or_default().push(
                FileRef {
                    id: FileId::new(fid),
                    name: file_name,
                    package: pkg,
                },
            );
        }
    }

    ignore_some_conflicts(&mut arch_soname);

    // Direct dependencies: resolve every DT_NEEDED of every set member.
    let mut closure: FxHashMap<FileId, BTreeSet<FileId>> = FxHashMap::default();
    {
        let mut stmt = conn
            .prepare_cached(
                "SELECT COALESCE(ef.arch, ''), en.name, f.file_id, f.name
                 FROM package_set_member psm
                 JOIN file f ON f.package_id = psm.package_id
                 JOIN elf_file ef ON ef.contents_id = f.contents_id
                 JOIN elf_needed en ON en.contents_id = f.contents_id
                 WHERE psm.set_id = ?1",
            )
            .map_err(sqlite_err)?;
        let rows = stmt
            .query_map(params![set.value()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(sqlite_err)?;
        for row in rows {
            let (arch, needed_name, fid, needing_path) = row.map_err(sqlite_err)?;
            let needing_file = FileId::new(fid);
            match lookup(
                &arch_soname,
                &arch,
                &needed_name,
                needing_file,
                &needing_path,
                conflicts,
            ) {
                Some(library) => {
                    closure.entry(needing_file).or_default().insert(library);
                }
                None => conflicts.missing(needing_file, &needed_name),
            }
        }
    }

    // Transitive closure: iterate to a fixpoint.
    let mut changed = true;
    while changed {
        changed = false;
        let files: Vec<FileId> = closure.keys().copied().collect();
        for file in files {
            let deps: Vec<FileId> = closure[&file].iter().copied().collect();
            let mut additions: Vec<FileId> = Vec::new();
            for dep in deps {
                if let Some(dep_deps) = closure.get(&dep) {
                    for &dep_dep in dep_deps {
                        if !closure[&file].contains(&dep_dep) {
                            additions.push(dep_dep);
                        }
                    }
                }
            }
            if !additions.is_empty() {
                changed = true;
                if let Some(deps) = closure.get_mut(&file) {
                    deps.extend(additions);
                }
            }
        }
    }

    if conflicts.skip_update() {
        return Ok(());
    }

    // Refresh the table for this set.
    conn.execute(
        "DELETE FROM elf_closure WHERE set_id = ?1",
        params![set.value()],
    )
    .map_err(sqlite_err)?;
    let mut stmt = conn
        .prepare_cached("INSERT INTO elf_closure (set_id, file_id, needed) VALUES (?1, ?2, ?3)")
        .map_err(sqlite_err)?;
    let mut rows = 0usize;
    for (file, deps) in &closure {
        for dep in deps {
            stmt.execute(params![set.value(), file.value(), dep.value()])
                .map_err(sqlite_err)?;
            rows += 1;
        }
    }
    tracing::debug!(
        set = set.value(),
        files = closure.len(),
        dependencies = rows,
        "updated elf closure"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_ref(id: i64, name: &str, package: &str) -> FileRef {
        FileRef {
            id: FileId::new(id),
            name: name.to_string(),
            package: package.to_string(),
        }
    }

    #[test]
    fn library_directories_win() {
        let system = file_ref(1, "/usr/lib64/libfoo.so.1", "foo");
        let bundled = file_ref(2, "/opt/app/lib/libfoo.so.1", "app");
        let needing = "/opt/app/bin/app";
        assert!(system.priority(needing) > bundled.priority(needing));
        // Without the lib bonus, the same-area provider would rate higher.
        assert!(bundled.priority(needing) > system.priority(needing) - 100_000);
    }

    #[test]
    fn same_directory_bonus() {
        let near = file_ref(1, "/usr/lib64/mysql/libmysql.so.18", "mysql-libs");
        let far = file_ref(2, "/usr/lib64/mysql55/libmysql.so.18", "mysql55-libs");
        let needing = "/usr/lib64/mysql/plugin.so";
        assert!(near.priority(needing) > far.priority(needing));
    }

    #[test]
    fn soname_synthesis() {
        assert_eq!(synthesize_soname("/usr/lib64/libx.so.1"), "libx.so.1");
        assert_eq!(synthesize_soname("libplain.so"), "libplain.so");
    }

    #[test]
    fn ignorable_providers_are_dropped_when_one_remains() {
        let mut map: ArchSonameMap = BTreeMap::new();
        map.entry("x86_64".into()).or_default().insert(
            "librt.so.1".into(),
            vec![
                file_ref(1, "/lib64/librt.so.1", "glibc"),
                file_ref(2, "/lib64/rtkaio/librtkaio-2.17.so", "glibc"),
            ],
        );
        ignore_some_conflicts(&mut map);
        let providers = &map["x86_64"]["librt.so.1"];
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].name, "/lib64/librt.so.1");
    }

    #[test]
    fn ignorable_providers_kept_when_conflict_remains() {
        let mut map: ArchSonameMap = BTreeMap::new();
        map.entry("x86_64".into()).or_default().insert(
            "libc.so.6".into(),
            vec![
                file_ref(1, "/lib64/libc.so.6", "glibc"),
                file_ref(2, "/usr/lib64/other/libc.so.6", "other-libc"),
                file_ref(3, "/lib64/rtkaio/librtkaio-2.17.so", "glibc"),
            ],
        );
        ignore_some_conflicts(&mut map);
        assert_eq!(map["x86_64"]["libc.so.6"].len(), 3);
    }
}
