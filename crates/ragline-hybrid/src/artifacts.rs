use std::path::{Path, PathBuf};

use ragline_text::LexicalPaths;

/// Where each index lives under the artifact root.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub root: PathBuf,
    pub vectorstore: PathBuf,
    pub lexical: LexicalPaths,
}

impl ArtifactPaths {
    pub fn under(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            vectorstore: root.join("vectorstore"),
            lexical: LexicalPaths::under(&root.join("bm25")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_keeps_lexical_artifacts_apart() {
        let p = ArtifactPaths::under(Path::new("retrievers"));
        assert_eq!(p.vectorstore, PathBuf::from("retrievers/vectorstore"));
        assert_eq!(p.lexical.index_dir, PathBuf::from("retrievers/bm25/index"));
        assert_eq!(p.lexical.chunks_file, PathBuf::from("retrievers/bm25/chunks.json"));
    }
}
