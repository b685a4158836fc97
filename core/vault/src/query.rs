//! Folder resolution and item listing.

use tracing::{debug, error};

use bwkeys_common::{Error, FolderId, Result, SessionToken};

use crate::backend::{Folder, VaultBackend};
use crate::item::Item;

/// Resolve a folder name to exactly one folder id.
///
/// # Errors
/// - `Error::NotFound` if no folder has exactly this name
/// - `Error::Ambiguous` if several do
/// - Backend failures
pub async fn resolve_folder(
    backend: &dyn VaultBackend,
    session: &SessionToken,
    name: &str,
) -> Result<FolderId> {
    debug!(folder = name, "Searching vault folders");
    let folders = backend.search_folders(session, name).await?;
    select_folder(name, folders)
}

/// Pick the single folder whose name equals `name`.
///
/// The search backend matches substrings, so candidates are filtered for
/// exact equality before counting. Folders without an id never match.
pub fn select_folder(name: &str, folders: Vec<Folder>) -> Result<FolderId> {
    let mut matches: Vec<FolderId> = folders
        .into_iter()
        .filter(|f| f.name == name)
        .filter_map(|f| f.id)
        .collect();

    match matches.len() {
        0 => {
            error!("\"{}\" folder not found", name);
            Err(Error::NotFound(format!("folder \"{}\"", name)))
        }
        1 => Ok(matches.remove(0)),
        n => {
            error!("{} folders with the name \"{}\" found", n, name);
            Err(Error::Ambiguous(format!(
                "{} folders named \"{}\"",
                n, name
            )))
        }
    }
}

/// List all items in a folder, preserving backend order.
pub async fn list_items(
    backend: &dyn VaultBackend,
    session: &SessionToken,
    folder: &FolderId,
) -> Result<Vec<Item>> {
    debug!(folder_id = %folder, "Listing folder items");
    let items = backend.list_items(session, folder).await?;
    debug!(count = items.len(), "Folder items listed");
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryBackend, MEMORY_SESSION};
    use proptest::prelude::*;

    fn folder(id: Option<&str>, name: &str) -> Folder {
        Folder {
            id: id.map(|i| FolderId::new(i).unwrap()),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_exact_match_selected() {
        let folders = vec![
            folder(Some("f-1"), "ssh-agent-archive"),
            folder(Some("f-2"), "ssh-agent"),
        ];
        assert_eq!(select_folder("ssh-agent", folders).unwrap().as_str(), "f-2");
    }

    #[test]
    fn test_substring_only_is_not_found() {
        let folders = vec![folder(Some("f-1"), "ssh-agent-archive")];
        assert!(matches!(
            select_folder("ssh-agent", folders),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_duplicates_are_ambiguous() {
        let folders = vec![
            folder(Some("f-1"), "ssh-agent"),
            folder(Some("f-2"), "ssh-agent"),
        ];
        assert!(matches!(
            select_folder("ssh-agent", folders),
            Err(Error::Ambiguous(_))
        ));
    }

    #[test]
    fn test_folder_without_id_never_matches() {
        let folders = vec![folder(None, "No Folder")];
        assert!(matches!(
            select_folder("No Folder", folders),
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_ambiguous_folder_lists_nothing() {
        let backend = MemoryBackend::new()
            .with_folder("f-1", "ssh-agent")
            .with_folder("f-2", "ssh-agent");
        let session = SessionToken::new(MEMORY_SESSION).unwrap();

        let result = resolve_folder(&backend, &session, "ssh-agent").await;

        assert!(matches!(result, Err(Error::Ambiguous(_))));
        assert_eq!(backend.calls(), vec!["search_folders"]);
    }

    proptest! {
        #[test]
        fn prop_selection_counts_exact_names(
            names in proptest::collection::vec(
                prop_oneof!["ssh-agent", "ssh-agent-2", "keys"],
                0..8
            )
        ) {
            let folders: Vec<Folder> = names
                .iter()
                .enumerate()
                .map(|(i, n)| folder(Some(&format!("f-{}", i)), n))
                .collect();
            let exact = names.iter().filter(|n| n.as_str() == "ssh-agent").count();

            match select_folder("ssh-agent", folders) {
                Ok(id) => {
                    prop_assert_eq!(exact, 1);
                    let index = names.iter().position(|n| n == "ssh-agent").unwrap();
                    prop_assert_eq!(id.as_str(), format!("f-{}", index));
                }
                Err(Error::NotFound(_)) => prop_assert_eq!(exact, 0),
                Err(Error::Ambiguous(_)) => prop_assert!(exact > 1),
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
        }
    }
}
