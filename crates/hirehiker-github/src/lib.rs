//! HireHiker GitHub - project files from GitHub repositories
//!
//! This crate provides:
//! - Tarball download through the GitHub REST API
//! - Tar extraction into project files
//! - WebContainer file-tree construction
//! - A process-wide cache of extracted repositories

pub mod archive;
pub mod cache;
pub mod client;

pub use archive::{build_file_tree, extract_tarball, FileSystemNode, FileSystemTree};
pub use cache::{fetch_project_files, TarballCache};
pub use client::{GitHubClient, RepoRef};
