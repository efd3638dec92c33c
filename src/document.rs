//! Standalone LaTeX documents around a TikZ snippet.
//!
//! Both the remote service and the local compiler need a complete document;
//! they differ only in the `standalone` class options.

const PACKAGES: &[&str] = &["tikz", "amsmath", "amsfonts", "amssymb"];
const TIKZ_LIBRARIES: &str = "arrows,shapes,positioning,calc,decorations.pathreplacing,patterns";

/// Which consumer the document is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentTarget {
    /// The remote compile service, which crops the output itself.
    Remote,
    /// The local compiler, where `standalone` must load TikZ mode.
    Local,
}

impl DocumentTarget {
    fn class_options(self) -> &'static str {
        match self {
            DocumentTarget::Remote => "border=2pt",
            DocumentTarget::Local => "tikz,border=2pt",
        }
    }
}

/// Wrap `snippet` in a `tikzpicture` environment unless it already has one.
pub fn picture_body(snippet: &str) -> String {
    let snippet = snippet.trim();
    if snippet.contains("\\begin{tikzpicture}") {
        snippet.to_string()
    } else {
        format!("\\begin{{tikzpicture}}\n{snippet}\n\\end{{tikzpicture}}")
    }
}

/// Build a complete compilable document for `snippet`.
pub fn wrap(snippet: &str, target: DocumentTarget) -> String {
    let mut doc = format!("\\documentclass[{}]{{standalone}}\n", target.class_options());
    for package in PACKAGES {
        doc.push_str(&format!("\\usepackage{{{package}}}\n"));
    }
    doc.push_str(&format!("\\usetikzlibrary{{{TIKZ_LIBRARIES}}}\n"));
    doc.push_str("\\begin{document}\n");
    doc.push_str(&picture_body(snippet));
    doc.push_str("\n\\end{document}\n");
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adds_environment_when_missing() {
        let doc = wrap("\\draw (0,0) -- (1,1);", DocumentTarget::Local);
        assert!(doc.starts_with("\\documentclass[tikz,border=2pt]{standalone}"));
        assert!(doc.contains("\\begin{tikzpicture}\n\\draw (0,0) -- (1,1);\n\\end{tikzpicture}"));
        assert!(doc.trim_end().ends_with("\\end{document}"));
    }

    #[test]
    fn test_keeps_existing_environment() {
        let snippet = "\\begin{tikzpicture}[scale=2]\n\\draw (0,0) circle (1);\n\\end{tikzpicture}";
        let doc = wrap(snippet, DocumentTarget::Remote);
        assert_eq!(doc.matches("\\begin{tikzpicture}").count(), 1);
        assert!(doc.contains("[scale=2]"));
        assert!(doc.starts_with("\\documentclass[border=2pt]{standalone}"));
    }
}
