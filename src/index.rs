//! The encrypted folder/file tree: in-memory operations plus the
//! encrypt-and-atomic-write / decrypt-and-parse pair that persists it to
//! `index.enc`.
//!
//! # On-disk layout
//!
//! `index.enc` is not a bare [`crate::crypto::cipher`] blob: it is prefixed
//! with the 16-byte Argon2 salt in the clear, so `load` can derive the master
//! key before it has anything decrypted yet. The same salt is also carried
//! inside the encrypted plaintext (`IndexFile::salt`), which is the
//! authoritative copy; the cleartext prefix is only a bootstrap cache, and a
//! mismatch between the two is treated as corruption rather than silently
//! trusting either one.
//!
//! ```text
//! salt (16 bytes, cleartext) | encrypt_blob(vault_key, json({version, salt, tree}))
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::{FORMAT_VERSION, SALT_LEN};
use crate::crypto::{decrypt_blob, derive_master_key, derive_vault_key, encrypt_blob};
use crate::error::VaultError;
use crate::layout::index_path;
use crate::models::{ContentHash, FileIdentifier, Salt, VaultIdentifier, VaultKey};

/// A folder or file node in the vault's encrypted tree. Deliberately a
/// tagged enum rather than a trait object: the set of node kinds is closed
/// and every consumer (diffing, serialization, rendering) matches on it
/// exhaustively.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum IndexNode {
  Folder { name: String, children: Vec<IndexNode> },
  File { name: String, file_id: FileIdentifier, content_hash: ContentHash },
}

impl IndexNode {
  pub fn name(&self) -> &str {
    match self {
      IndexNode::Folder { name, .. } => name,
      IndexNode::File { name, .. } => name,
    }
  }

  pub fn is_folder(&self) -> bool {
    matches!(self, IndexNode::Folder { .. })
  }

  fn root() -> Self {
    IndexNode::Folder {
      name: String::new(),
      children: Vec::new(),
    }
  }

  fn children(&self) -> Option<&Vec<IndexNode>> {
    match self {
      IndexNode::Folder { children, .. } => Some(children),
      IndexNode::File { .. } => None,
    }
  }

  fn children_mut(&mut self) -> Option<&mut Vec<IndexNode>> {
    match self {
      IndexNode::Folder { children, .. } => Some(children),
      IndexNode::File { .. } => None,
    }
  }
}

fn split_path(path: &str) -> Vec<&str> {
  path.split('/').filter(|c| !c.is_empty()).collect()
}

fn split_parent(path: &str) -> Result<(Vec<&str>, &str), VaultError> {
  let mut components = split_path(path);
  let leaf = components
    .pop()
    .ok_or_else(|| VaultError::InvalidInput("path must not be empty".into()))?;
  Ok((components, leaf))
}

/// The vault's folder/file tree, plus a reverse map from [`FileIdentifier`]
/// to the posix path at which it currently lives.
///
/// The reverse map is rebuilt in full after every mutation rather than
/// updated incrementally: vault trees are small enough (personal notes, not
/// a filesystem) that this is simpler to keep correct than threading
/// incremental updates through rename/remove, and a stale entry here would
/// be a correctness bug, not just a performance one.
#[derive(Clone, Debug)]
pub struct Index {
  root: IndexNode,
  file_paths: HashMap<FileIdentifier, String>,
}

impl Default for Index {
  fn default() -> Self {
    Self {
      root: IndexNode::root(),
      file_paths: HashMap::new(),
    }
  }
}

impl Index {
  pub fn new() -> Self {
    Self::default()
  }

  /// An empty index whose root folder is named `name` (the vault's display
  /// name, recorded once at creation time).
  pub fn new_named(name: &str) -> Self {
    Self {
      root: IndexNode::Folder {
        name: name.to_string(),
        children: Vec::new(),
      },
      file_paths: HashMap::new(),
    }
  }

  /// The vault's display name, as recorded in the root folder at creation.
  pub fn root_name(&self) -> &str {
    self.root.name()
  }

  /// Looks up a node by posix-relative path. The empty string resolves to
  /// the root folder.
  pub fn find_by_path(&self, path: &str) -> Option<&IndexNode> {
    let mut node = &self.root;
    for component in split_path(path) {
      node = node.children()?.iter().find(|c| c.name() == component)?;
    }
    Some(node)
  }

  fn find_mut(&mut self, path_components: &[&str]) -> Option<&mut IndexNode> {
    let mut node = &mut self.root;
    for component in path_components {
      node = node.children_mut()?.iter_mut().find(|c| c.name() == *component)?;
    }
    Some(node)
  }

  /// The posix path at which `file_id` currently lives, if it is present in
  /// the index.
  pub fn path_of(&self, file_id: FileIdentifier) -> Option<&str> {
    self.file_paths.get(&file_id).map(String::as_str)
  }

  /// Every `FileIdentifier` currently referenced by the tree.
  pub fn file_ids(&self) -> impl Iterator<Item = FileIdentifier> + '_ {
    self.file_paths.keys().copied()
  }

  /// Every indexed file as `(posix_path, file_id, recorded_content_hash)`,
  /// used by the session reconciliation to build its "what the index
  /// currently says" side of the diff.
  pub fn file_entries(&self) -> Vec<(String, FileIdentifier, ContentHash)> {
    let mut out = Vec::new();
    collect_file_entries(&self.root, &mut Vec::new(), &mut out);
    out
  }

  fn parent_folder_mut(&mut self, parent_path: &str) -> Result<&mut IndexNode, VaultError> {
    let components = split_path(parent_path);
    let parent = self
      .find_mut(&components)
      .ok_or_else(|| VaultError::InvalidInput(format!("no such folder: {parent_path}")))?;
    if !parent.is_folder() {
      return Err(VaultError::InvalidInput(format!("{parent_path} is not a folder")));
    }
    Ok(parent)
  }

  /// Creates a new, empty folder named `name` under `parent_path`.
  ///
  /// # Errors
  ///
  /// [`VaultError::Exists`] if a sibling with that name already exists.
  pub fn add_folder(&mut self, parent_path: &str, name: &str) -> Result<(), VaultError> {
    let parent = self.parent_folder_mut(parent_path)?;
    let children = parent.children_mut().unwrap();
    if children.iter().any(|c| c.name() == name) {
      return Err(VaultError::Exists(format!("{parent_path}/{name}")));
    }
    children.push(IndexNode::Folder {
      name: name.to_string(),
      children: Vec::new(),
    });
    Ok(())
  }

  /// Registers a new file named `name` under `parent_path`, bound to
  /// `file_id` and `content_hash`.
  ///
  /// # Errors
  ///
  /// [`VaultError::Exists`] if a sibling with that name already exists.
  pub fn add_file(
    &mut self,
    parent_path: &str,
    name: &str,
    file_id: FileIdentifier,
    content_hash: ContentHash,
  ) -> Result<(), VaultError> {
    let parent = self.parent_folder_mut(parent_path)?;
    let children = parent.children_mut().unwrap();
    if children.iter().any(|c| c.name() == name) {
      return Err(VaultError::Exists(format!("{parent_path}/{name}")));
    }
    children.push(IndexNode::File {
      name: name.to_string(),
      file_id,
      content_hash,
    });
    self.recompute_file_paths();
    Ok(())
  }

  /// Updates the content hash recorded for `file_id`, leaving its position
  /// in the tree unchanged.
  pub fn update_content_hash(&mut self, file_id: FileIdentifier, content_hash: ContentHash) -> Result<(), VaultError> {
    let path = self
      .path_of(file_id)
      .ok_or_else(|| VaultError::InvalidInput("file_id not present in index".into()))?
      .to_string();
    let components = split_path(&path);
    let node = self
      .find_mut(&components)
      .ok_or_else(|| VaultError::InvalidInput("file_id path is stale".into()))?;
    match node {
      IndexNode::File { content_hash: existing, .. } => {
        *existing = content_hash;
        Ok(())
      }
      IndexNode::Folder { .. } => Err(VaultError::InvalidInput("indexed file_id resolved to a folder".into())),
    }
  }

  /// Removes the node at `path` (file or folder, recursively). Returns every
  /// `FileIdentifier` that was removed from the tree, so the caller can
  /// schedule their ciphertext blobs for secure deletion.
  ///
  /// # Errors
  ///
  /// [`VaultError::InvalidInput`] if `path` is the root or does not exist.
  pub fn remove(&mut self, path: &str) -> Result<Vec<FileIdentifier>, VaultError> {
    let (parent_components, leaf) = split_parent(path)?;
    let parent = self
      .find_mut(&parent_components)
      .ok_or_else(|| VaultError::InvalidInput(format!("no such path: {path}")))?;
    let children = parent
      .children_mut()
      .ok_or_else(|| VaultError::InvalidInput(format!("{path}'s parent is not a folder")))?;
    let position = children
      .iter()
      .position(|c| c.name() == leaf)
      .ok_or_else(|| VaultError::InvalidInput(format!("no such path: {path}")))?;
    let removed = children.remove(position);

    let mut removed_ids = Vec::new();
    collect_file_ids(&removed, &mut removed_ids);
    self.recompute_file_paths();
    Ok(removed_ids)
  }

  /// Renames the node at `path` to `new_name`, in place (no ciphertext is
  /// touched; file keys are derived from [`FileIdentifier`], not name).
  ///
  /// # Errors
  ///
  /// [`VaultError::Exists`] if a sibling already has `new_name`.
  pub fn rename(&mut self, path: &str, new_name: &str) -> Result<(), VaultError> {
    let (parent_components, leaf) = split_parent(path)?;
    let parent = self
      .find_mut(&parent_components)
      .ok_or_else(|| VaultError::InvalidInput(format!("no such path: {path}")))?;
    let children = parent
      .children_mut()
      .ok_or_else(|| VaultError::InvalidInput(format!("{path}'s parent is not a folder")))?;
    if children.iter().any(|c| c.name() == new_name) {
      return Err(VaultError::Exists(format!("{}/{}", parent_components.join("/"), new_name)));
    }
    let node = children
      .iter_mut()
      .find(|c| c.name() == leaf)
      .ok_or_else(|| VaultError::InvalidInput(format!("no such path: {path}")))?;
    match node {
      IndexNode::Folder { name, .. } | IndexNode::File { name, .. } => *name = new_name.to_string(),
    }
    self.recompute_file_paths();
    Ok(())
  }

  fn recompute_file_paths(&mut self) {
    let mut paths = HashMap::new();
    walk_paths(&self.root, &mut Vec::new(), &mut paths);
    self.file_paths = paths;
  }
}

fn collect_file_ids(node: &IndexNode, out: &mut Vec<FileIdentifier>) {
  match node {
    IndexNode::File { file_id, .. } => out.push(*file_id),
    IndexNode::Folder { children, .. } => {
      for child in children {
        collect_file_ids(child, out);
      }
    }
  }
}

fn collect_file_entries(node: &IndexNode, prefix: &mut Vec<String>, out: &mut Vec<(String, FileIdentifier, ContentHash)>) {
  match node {
    IndexNode::File { file_id, content_hash, .. } => out.push((prefix.join("/"), *file_id, *content_hash)),
    IndexNode::Folder { children, .. } => {
      for child in children {
        prefix.push(child.name().to_string());
        collect_file_entries(child, prefix, out);
        prefix.pop();
      }
    }
  }
}

fn walk_paths(node: &IndexNode, prefix: &mut Vec<String>, out: &mut HashMap<FileIdentifier, String>) {
  match node {
    IndexNode::File { file_id, .. } => {
      out.insert(*file_id, prefix.join("/"));
    }
    IndexNode::Folder { children, .. } => {
      for child in children {
        prefix.push(child.name().to_string());
        walk_paths(child, prefix, out);
        prefix.pop();
      }
    }
  }
}

/// The plaintext structure encrypted inside `index.enc`.
#[derive(Serialize, Deserialize)]
struct IndexFile {
  version: u32,
  salt: Salt,
  tree: IndexNode,
}

/// Encrypts `index` under `vault_key` and atomically writes it to
/// `vault_dir/index.enc`, prefixed in the clear with `salt` so a future
/// [`load`] can re-derive the master key.
pub fn save(vault_dir: &std::path::Path, vault_key: &VaultKey, salt: Salt, index: &Index) -> Result<(), VaultError> {
  let file = IndexFile {
    version: FORMAT_VERSION,
    salt,
    tree: index.root.clone(),
  };
  let plaintext = serde_json::to_vec(&file).map_err(|e| VaultError::InvalidInput(format!("index serialization: {e}")))?;
  let blob = encrypt_blob(vault_key.as_bytes(), &plaintext)?;

  let mut out = Vec::with_capacity(SALT_LEN + blob.len());
  out.extend_from_slice(salt.as_bytes());
  out.extend_from_slice(&blob);
  crate::io::atomic_write(&index_path(vault_dir), &out)
}

/// Reads `vault_dir/index.enc`, derives the master and vault keys from
/// `password` and the cleartext salt prefix, and decrypts and parses the
/// tree.
///
/// # Errors
///
/// Returns [`VaultError::InvalidPassword`] if decryption fails (wrong
/// password or corruption — deliberately indistinguishable) or if the
/// decrypted plaintext's embedded salt disagrees with the cleartext prefix
/// used to derive the key.
pub fn load(vault_dir: &std::path::Path, vault_id: VaultIdentifier, password: &[u8]) -> Result<(Index, VaultKey, Salt), VaultError> {
  let raw = std::fs::read(index_path(vault_dir))?;
  if raw.len() < SALT_LEN {
    return Err(VaultError::InvalidPassword);
  }
  let (salt_bytes, blob) = raw.split_at(SALT_LEN);
  let salt: [u8; SALT_LEN] = salt_bytes.try_into().unwrap();

  let master_key = derive_master_key(password, &salt).map_err(|_| VaultError::InvalidPassword)?;
  let vault_key = derive_vault_key(&master_key, &vault_id)?;

  let plaintext = decrypt_blob(vault_key.as_bytes(), blob).map_err(|_| VaultError::InvalidPassword)?;
  let file: IndexFile = serde_json::from_slice(&plaintext).map_err(|_| VaultError::InvalidPassword)?;
  if file.salt.0 != salt {
    return Err(VaultError::InvalidPassword);
  }

  let mut index = Index {
    root: file.tree,
    file_paths: HashMap::new(),
  };
  index.recompute_file_paths();
  Ok((index, vault_key, file.salt))
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  fn sample_hash(byte: u8) -> ContentHash {
    ContentHash([byte; 32])
  }

  #[test]
  fn add_folder_and_file_then_find_by_path() {
    let mut index = Index::new();
    index.add_folder("", "Ideas").unwrap();
    let file_id = FileIdentifier::random();
    index.add_file("Ideas", "today.md", file_id, sample_hash(1)).unwrap();

    let node = index.find_by_path("Ideas/today.md").unwrap();
    assert!(matches!(node, IndexNode::File { .. }));
    assert_eq!(index.path_of(file_id), Some("Ideas/today.md"));
  }

  #[test]
  fn add_file_rejects_duplicate_sibling_name() {
    let mut index = Index::new();
    index.add_file("", "today.md", FileIdentifier::random(), sample_hash(1)).unwrap();
    let err = index.add_file("", "today.md", FileIdentifier::random(), sample_hash(2));
    assert!(matches!(err, Err(VaultError::Exists(_))));
  }

  #[test]
  fn remove_folder_returns_every_contained_file_id() {
    let mut index = Index::new();
    index.add_folder("", "Ideas").unwrap();
    let a = FileIdentifier::random();
    let b = FileIdentifier::random();
    index.add_file("Ideas", "a.md", a, sample_hash(1)).unwrap();
    index.add_file("Ideas", "b.md", b, sample_hash(2)).unwrap();

    let mut removed = index.remove("Ideas").unwrap();
    removed.sort_by_key(|id| id.0);
    let mut expected = vec![a, b];
    expected.sort_by_key(|id| id.0);
    assert_eq!(removed.iter().map(|id| id.0).collect::<Vec<_>>(), expected.iter().map(|id| id.0).collect::<Vec<_>>());
    assert!(index.find_by_path("Ideas").is_none());
    assert!(index.path_of(a).is_none());
  }

  #[test]
  fn rename_updates_path_of_nested_file() {
    let mut index = Index::new();
    index.add_folder("", "Ideas").unwrap();
    let file_id = FileIdentifier::random();
    index.add_file("Ideas", "today.md", file_id, sample_hash(1)).unwrap();

    index.rename("Ideas", "Notes").unwrap();
    assert_eq!(index.path_of(file_id), Some("Notes/today.md"));
    assert!(index.find_by_path("Ideas").is_none());
  }

  #[test]
  fn rename_rejects_collision_with_existing_sibling() {
    let mut index = Index::new();
    index.add_file("", "a.md", FileIdentifier::random(), sample_hash(1)).unwrap();
    index.add_file("", "b.md", FileIdentifier::random(), sample_hash(2)).unwrap();
    assert!(matches!(index.rename("a.md", "b.md"), Err(VaultError::Exists(_))));
  }

  #[test]
  fn save_then_load_roundtrips_tree_and_rejects_wrong_password() {
    let dir = tempdir().unwrap();
    let vault_id = VaultIdentifier::random();

    let mut index = Index::new();
    index.add_folder("", "Ideas").unwrap();
    index.add_file("Ideas", "today.md", FileIdentifier::random(), sample_hash(7)).unwrap();

    let salt = Salt::random();
    let master_key = derive_master_key(b"correct horse battery staple", salt.as_bytes()).unwrap();
    let vault_key = derive_vault_key(&master_key, &vault_id).unwrap();
    save(dir.path(), &vault_key, salt, &index).unwrap();

    let (loaded, _, loaded_salt) = load(dir.path(), vault_id, b"correct horse battery staple").unwrap();
    assert_eq!(loaded_salt.0, salt.0);
    assert!(loaded.find_by_path("Ideas/today.md").is_some());

    let err = load(dir.path(), vault_id, b"wrong password");
    assert!(matches!(err, Err(VaultError::InvalidPassword)));
  }
}
