//! Pure derivation of one tree level from the flat listing.

use std::collections::{BTreeMap, HashMap};

use common::model::{FolderStats, ROOT_FOLDER, StorageObject};

/// One entry at the current tree level: a virtual folder or a file.
#[derive(Debug, Clone, PartialEq)]
pub enum ExplorerItem {
    Folder { name: String, stats: FolderStats },
    File(StorageObject),
}

impl ExplorerItem {
    pub fn as_file(&self) -> Option<&StorageObject> {
        match self {
            ExplorerItem::File(object) => Some(object),
            ExplorerItem::Folder { .. } => None,
        }
    }
}

/// Derive the folders and files visible at `current_path`.
///
/// At the root, top-level folders come from the precomputed `folder_stats`
/// and root files are the objects of the `"root"` pseudo-folder. Below the
/// root, immediate child folders and their statistics are recomputed from
/// the flat listing in a single pass. Folders sort before files; each group
/// is in lexicographic order.
pub fn build_view(
    objects: &[StorageObject],
    folder_stats: &HashMap<String, FolderStats>,
    current_path: &[String],
) -> Vec<ExplorerItem> {
    if current_path.is_empty() {
        return build_root_view(objects, folder_stats);
    }

    let prefix = format!("{}/", current_path.join("/"));
    let mut child_folders: BTreeMap<String, FolderStats> = BTreeMap::new();
    let mut files: Vec<StorageObject> = Vec::new();

    for object in objects {
        let Some(remainder) = object.key.strip_prefix(&prefix) else {
            continue;
        };
        // An exact prefix match has no trailing content and is not a valid
        // object; it must not surface as a zero-length folder or file name
        if remainder.is_empty() {
            continue;
        }
        match remainder.split_once('/') {
            Some((child, rest)) if !child.is_empty() && !rest.is_empty() => {
                child_folders
                    .entry(child.to_string())
                    .or_default()
                    .add(object.size);
            }
            Some(_) => continue,
            None => files.push(object.clone()),
        }
    }

    files.sort_by(|a, b| a.key.cmp(&b.key));

    let mut items: Vec<ExplorerItem> = child_folders
        .into_iter()
        .map(|(name, stats)| ExplorerItem::Folder { name, stats })
        .collect();
    items.extend(files.into_iter().map(ExplorerItem::File));
    items
}

fn build_root_view(
    objects: &[StorageObject],
    folder_stats: &HashMap<String, FolderStats>,
) -> Vec<ExplorerItem> {
    let folders: BTreeMap<&String, &FolderStats> = folder_stats
        .iter()
        .filter(|(name, _)| name.as_str() != ROOT_FOLDER)
        .collect();

    let mut files: Vec<StorageObject> = objects
        .iter()
        .filter(|object| object.folder == ROOT_FOLDER)
        .cloned()
        .collect();
    files.sort_by(|a, b| a.key.cmp(&b.key));

    let mut items: Vec<ExplorerItem> = folders
        .into_iter()
        .map(|(name, stats)| ExplorerItem::Folder {
            name: name.clone(),
            stats: *stats,
        })
        .collect();
    items.extend(files.into_iter().map(ExplorerItem::File));
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::model::top_level_folder;

    fn obj(key: &str, size: u64) -> StorageObject {
        StorageObject {
            key: key.to_string(),
            size,
            last_modified: Utc::now(),
            folder: top_level_folder(key).to_string(),
            url: format!("/{key}"),
        }
    }

    fn stats_for(objects: &[StorageObject]) -> HashMap<String, FolderStats> {
        let mut stats: HashMap<String, FolderStats> = HashMap::new();
        for object in objects {
            stats.entry(object.folder.clone()).or_default().add(object.size);
        }
        stats
    }

    fn folder_names(items: &[ExplorerItem]) -> Vec<&str> {
        items
            .iter()
            .filter_map(|item| match item {
                ExplorerItem::Folder { name, .. } => Some(name.as_str()),
                ExplorerItem::File(_) => None,
            })
            .collect()
    }

    fn file_keys(items: &[ExplorerItem]) -> Vec<&str> {
        items
            .iter()
            .filter_map(|item| item.as_file().map(|object| object.key.as_str()))
            .collect()
    }

    #[test]
    fn test_root_view_with_two_folders() {
        // Bucket: a/x.png (10), a/y.png (20), b/z.png (5)
        let objects = vec![obj("a/x.png", 10), obj("a/y.png", 20), obj("b/z.png", 5)];
        let stats = stats_for(&objects);

        let items = build_view(&objects, &stats, &[]);

        assert_eq!(items.len(), 2);
        assert_eq!(folder_names(&items), vec!["a", "b"]);
        assert!(file_keys(&items).is_empty());
        match &items[0] {
            ExplorerItem::Folder { name, stats } => {
                assert_eq!(name, "a");
                assert_eq!(stats.count, 2);
                assert_eq!(stats.total_size, 30);
            }
            other => panic!("expected folder, got {other:?}"),
        }
    }

    #[test]
    fn test_navigating_into_folder_lists_files() {
        let objects = vec![obj("a/x.png", 10), obj("a/y.png", 20), obj("b/z.png", 5)];
        let stats = stats_for(&objects);

        let items = build_view(&objects, &stats, &["a".to_string()]);

        assert!(folder_names(&items).is_empty());
        assert_eq!(file_keys(&items), vec!["a/x.png", "a/y.png"]);
    }

    #[test]
    fn test_root_files_appear_after_folders() {
        let objects = vec![obj("zz.png", 1), obj("aa.png", 2), obj("pets/cat.png", 3)];
        let stats = stats_for(&objects);

        let items = build_view(&objects, &stats, &[]);

        assert_eq!(folder_names(&items), vec!["pets"]);
        assert_eq!(file_keys(&items), vec!["aa.png", "zz.png"]);
        assert!(matches!(items[0], ExplorerItem::Folder { .. }));
    }

    #[test]
    fn test_nested_child_folder_stats_recomputed() {
        let objects = vec![
            obj("pets/dogs/rex.png", 10),
            obj("pets/dogs/fido.png", 15),
            obj("pets/cats/tom.png", 20),
            obj("pets/readme.txt", 1),
            obj("banners/hero.png", 99),
        ];
        let stats = stats_for(&objects);

        let items = build_view(&objects, &stats, &["pets".to_string()]);

        assert_eq!(folder_names(&items), vec!["cats", "dogs"]);
        assert_eq!(file_keys(&items), vec!["pets/readme.txt"]);
        match &items[1] {
            ExplorerItem::Folder { name, stats } => {
                assert_eq!(name, "dogs");
                assert_eq!(stats.count, 2);
                assert_eq!(stats.total_size, 25);
            }
            other => panic!("expected dogs folder, got {other:?}"),
        }

        let deeper = build_view(&objects, &stats, &["pets".to_string(), "dogs".to_string()]);
        assert!(folder_names(&deeper).is_empty());
        assert_eq!(deeper.len(), 2);
    }

    #[test]
    fn test_tree_consistency_at_every_level() {
        // Sum of child stats at a path must equal the number of objects that
        // have the path as a strict folder-ancestor
        let objects = vec![
            obj("pets/dogs/rex.png", 10),
            obj("pets/dogs/puppies/spot.png", 5),
            obj("pets/cats/tom.png", 20),
            obj("pets/readme.txt", 1),
        ];
        let stats = stats_for(&objects);

        for path in [
            vec![],
            vec!["pets".to_string()],
            vec!["pets".to_string(), "dogs".to_string()],
        ] {
            let items = build_view(&objects, &stats, &path);
            let derived: usize = items
                .iter()
                .map(|item| match item {
                    ExplorerItem::Folder { stats, .. } => stats.count,
                    ExplorerItem::File(_) => 1,
                })
                .sum();

            let prefix = if path.is_empty() {
                String::new()
            } else {
                format!("{}/", path.join("/"))
            };
            let expected = objects
                .iter()
                .filter(|object| object.key.starts_with(&prefix))
                .count();

            assert_eq!(derived, expected, "at path {path:?}");
        }
    }

    #[test]
    fn test_exact_prefix_key_is_not_a_zero_length_folder() {
        // A key equal to the prefix itself must not surface at all
        let objects = vec![obj("pets/", 0), obj("pets/cat.png", 3)];
        let stats = stats_for(&objects);

        let items = build_view(&objects, &stats, &["pets".to_string()]);
        assert_eq!(file_keys(&items), vec!["pets/cat.png"]);
        assert!(folder_names(&items).is_empty());
    }

    #[test]
    fn test_unrelated_prefix_is_excluded() {
        // "petstore/x.png" must not match the "pets" path
        let objects = vec![obj("petstore/x.png", 1), obj("pets/cat.png", 3)];
        let stats = stats_for(&objects);

        let items = build_view(&objects, &stats, &["pets".to_string()]);
        assert_eq!(file_keys(&items), vec!["pets/cat.png"]);
    }

    #[test]
    fn test_empty_listing_yields_empty_view() {
        let items = build_view(&[], &HashMap::new(), &[]);
        assert!(items.is_empty());
    }
}
