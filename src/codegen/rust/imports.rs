//! Import normalization for generated Rust files
//!
//! Adds `use` items for the external names generated code relies on and drops
//! ones that are no longer referenced. `use` items outside the known set are
//! left untouched.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use syn::punctuated::Punctuated;
use syn::visit::{self, Visit};
use syn::{Item, ItemUse, Path, Token, UseTree};
use tracing::trace;

/// Identifier and the crate it is imported from
pub(super) const KNOWN_IMPORTS: &[(&str, &str)] = &[
    ("NaiveDateTime", "chrono"),
    ("Deserialize", "serde"),
    ("Serialize", "serde"),
];

pub(super) fn normalize(source: &str) -> Result<String, String> {
    let mut file = syn::parse_file(source).map_err(|e| e.to_string())?;

    file.items.retain(|item| match item {
        Item::Use(item_use) => !is_known_import(item_use),
        _ => true,
    });

    let mut imported = HashSet::new();
    for item in &file.items {
        if let Item::Use(item_use) = item {
            for leaf in use_leaves(&item_use.tree) {
                imported.insert(leaf.ident);
            }
        }
    }

    let mut collector = UsedIdents::default();
    collector.visit_file(&file);

    let mut needed: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for &(ident, krate) in KNOWN_IMPORTS {
        if collector.idents.contains(ident) && !imported.contains(ident) {
            needed.entry(krate).or_default().insert(ident);
        }
    }

    let mut uses = Vec::with_capacity(needed.len());
    for (krate, idents) in &needed {
        let idents: Vec<&str> = idents.iter().copied().collect();
        let tree = if idents.len() == 1 {
            idents[0].to_string()
        } else {
            format!("{{{}}}", idents.join(", "))
        };
        let src = format!("use {}::{};", krate, tree);
        trace!(import = ?src, "Adding import");
        let item_use: ItemUse = syn::parse_str(&src).map_err(|e| e.to_string())?;
        uses.push(Item::Use(item_use));
    }

    let first_non_use = file
        .items
        .iter()
        .position(|item| !matches!(item, Item::Use(_)))
        .unwrap_or(file.items.len());
    file.items.splice(first_non_use..first_non_use, uses);

    Ok(prettyplease::unparse(&file))
}

/// Identifiers referenced by paths and derive lists
#[derive(Default)]
struct UsedIdents {
    idents: HashSet<String>,
}

impl<'ast> Visit<'ast> for UsedIdents {
    fn visit_path(&mut self, path: &'ast Path) {
        if let Some(first) = path.segments.first() {
            self.idents.insert(first.ident.to_string());
        }
        visit::visit_path(self, path);
    }

    fn visit_attribute(&mut self, attr: &'ast syn::Attribute) {
        if attr.path().is_ident("derive") {
            if let Ok(paths) =
                attr.parse_args_with(Punctuated::<Path, Token![,]>::parse_terminated)
            {
                for path in &paths {
                    self.visit_path(path);
                }
            }
        }
        visit::visit_attribute(self, attr);
    }

    fn visit_item_use(&mut self, _: &'ast ItemUse) {}
}

struct UseLeaf {
    root: Option<String>,
    ident: String,
    renamed: bool,
}

fn use_leaves(tree: &UseTree) -> Vec<UseLeaf> {
    let mut leaves = Vec::new();
    collect_leaves(tree, None, &mut leaves);
    leaves
}

fn collect_leaves(tree: &UseTree, root: Option<&str>, out: &mut Vec<UseLeaf>) {
    match tree {
        UseTree::Path(p) => {
            let segment = p.ident.to_string();
            collect_leaves(&p.tree, Some(root.unwrap_or(&segment)), out);
        }
        UseTree::Name(n) => out.push(UseLeaf {
            root: root.map(str::to_string),
            ident: n.ident.to_string(),
            renamed: false,
        }),
        UseTree::Rename(r) => out.push(UseLeaf {
            root: root.map(str::to_string),
            ident: r.rename.to_string(),
            renamed: true,
        }),
        UseTree::Glob(_) => out.push(UseLeaf {
            root: root.map(str::to_string),
            ident: "*".to_string(),
            renamed: false,
        }),
        UseTree::Group(g) => {
            for item in &g.items {
                collect_leaves(item, root, out);
            }
        }
    }
}

/// A `use` item that only imports names from [`KNOWN_IMPORTS`]
fn is_known_import(item_use: &ItemUse) -> bool {
    let leaves = use_leaves(&item_use.tree);
    !leaves.is_empty()
        && leaves.iter().all(|leaf| {
            !leaf.renamed
                && KNOWN_IMPORTS.iter().any(|(ident, krate)| {
                    leaf.ident == *ident && leaf.root.as_deref() == Some(*krate)
                })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn use_lines(source: &str) -> Vec<String> {
        source
            .lines()
            .filter(|line| line.starts_with("use "))
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_adds_missing_imports() {
        let source = r#"
            #[derive(Debug, Serialize, Deserialize)]
            pub struct Users {
                pub id: i64,
                pub created_at: NaiveDateTime,
            }
        "#;

        let normalized = normalize(source).unwrap();

        assert_eq!(
            use_lines(&normalized),
            vec![
                "use chrono::NaiveDateTime;",
                "use serde::{Deserialize, Serialize};",
            ]
        );
    }

    #[test]
    fn test_drops_unused_known_import() {
        let source = r#"
            use chrono::NaiveDateTime;
            use serde::{Deserialize, Serialize};

            #[derive(Serialize, Deserialize)]
            pub struct Users {
                pub id: i64,
            }
        "#;

        let normalized = normalize(source).unwrap();

        assert_eq!(
            use_lines(&normalized),
            vec!["use serde::{Deserialize, Serialize};"]
        );
    }

    #[test]
    fn test_keeps_unknown_imports() {
        let source = r#"
            use std::collections::HashMap;

            pub struct Lookup {
                pub entries: HashMap<String, i64>,
            }
        "#;

        let normalized = normalize(source).unwrap();

        assert_eq!(use_lines(&normalized), vec!["use std::collections::HashMap;"]);
    }

    #[test]
    fn test_does_not_duplicate_existing_import() {
        let source = r#"
            use other::Serialize;

            #[derive(Serialize)]
            pub struct Users {
                pub id: i64,
            }
        "#;

        let normalized = normalize(source).unwrap();

        assert_eq!(use_lines(&normalized), vec!["use other::Serialize;"]);
    }

    #[test]
    fn test_keeps_inner_doc_first() {
        let source = r#"
            //! Generated.

            #[derive(Serialize)]
            pub struct Users {
                pub id: i64,
            }
        "#;

        let normalized = normalize(source).unwrap();

        assert!(normalized.starts_with("//! Generated."));
        assert!(normalized.contains("use serde::Serialize;"));
    }

    #[test]
    fn test_invalid_source_is_error() {
        assert!(normalize("pub struct {").is_err());
    }

    #[test]
    fn test_is_known_import() {
        let known: ItemUse = syn::parse_str("use serde::{Deserialize, Serialize};").unwrap();
        let mixed: ItemUse = syn::parse_str("use serde::{Serialize, de::Error};").unwrap();
        let renamed: ItemUse = syn::parse_str("use chrono::NaiveDateTime as Ts;").unwrap();

        assert!(is_known_import(&known));
        assert!(!is_known_import(&mixed));
        assert!(!is_known_import(&renamed));
    }
}
