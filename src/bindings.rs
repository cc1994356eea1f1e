//! Checks how a file binds the externalization name: whether it is imported
//! or defined at all, and whether it is reused as a throwaway variable that
//! would shadow the function inside converted code.

use serde::Serialize;
use std::collections::HashSet;

use crate::ast_utils::{ParsedSource, PyNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowKind {
    Assignment,
    Unpacking,
    ForLoop,
    Parameter,
    Alias,
}

/// A binding of the externalization name that hides the real function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShadowBinding {
    pub line: usize,
    pub kind: ShadowKind,
    pub line_text: String,
}

#[derive(Debug, Default, Clone)]
pub struct ExternUsage {
    /// Imported, assigned at module level, or defined with `def`
    pub has_binding: bool,
    pub shadows: Vec<ShadowBinding>,
}

/// Name that `gettext.install()` puts into builtins.
const INSTALLED_NAME: &str = "_";

const TRANSLATION_FACTORIES: &[&str] = &["translation", "NullTranslations", "GNUTranslations"];

pub fn extern_usage(source: &ParsedSource<'_>, name: &str) -> ExternUsage {
    let mut walker = Walker {
        source,
        name,
        usage: ExternUsage::default(),
        translations: HashSet::new(),
    };
    walker.walk(&source.root(), false);
    walker.usage
}

struct Walker<'s, 'a> {
    source: &'s ParsedSource<'a>,
    name: &'s str,
    usage: ExternUsage,
    /// Variables holding translation objects
    translations: HashSet<String>,
}

impl Walker<'_, '_> {
    fn walk(&mut self, node: &PyNode<'_>, in_function: bool) {
        let mut in_function = in_function;
        match node.kind().as_ref() {
            "import_from_statement" => {
                let module = node.field("module_name").map(|m| m.range());
                for child in node.children().filter(|c| c.is_named()) {
                    if Some(child.range()) == module {
                        continue;
                    }
                    let bound = match child.kind().as_ref() {
                        "wildcard_import" => true,
                        "dotted_name" => child.text() == self.name,
                        "aliased_import" => {
                            child.field("alias").is_some_and(|a| a.text() == self.name)
                        }
                        _ => false,
                    };
                    self.usage.has_binding |= bound;
                }
            }
            "aliased_import" => {
                if node.field("alias").is_some_and(|a| a.text() == self.name) {
                    self.usage.has_binding = true;
                }
            }
            "function_definition" => {
                if node.field("name").is_some_and(|n| n.text() == self.name) {
                    self.usage.has_binding = true;
                }
                if let Some(parameters) = node.field("parameters") {
                    for parameter in parameters.children().filter(|c| c.is_named()) {
                        let ident = if parameter.kind() == "identifier" {
                            Some(parameter.clone())
                        } else {
                            parameter
                                .field("name")
                                .or_else(|| parameter.children().find(|c| c.kind() == "identifier"))
                        };
                        if ident.is_some_and(|i| i.text() == self.name) {
                            self.record(&parameter, ShadowKind::Parameter);
                        }
                    }
                }
                in_function = true;
            }
            "assignment" => {
                if let Some(left) = node.field("left") {
                    if left.kind() == "identifier" {
                        if left.text() == self.name {
                            if in_function {
                                self.record(&left, ShadowKind::Assignment);
                            } else {
                                self.usage.has_binding = true;
                            }
                        } else if node.field("right").is_some_and(|r| self.is_translation(&r)) {
                            self.translations.insert(left.text().to_string());
                        }
                    } else if binds(&left, self.name) {
                        self.record(&left, ShadowKind::Unpacking);
                    }
                }
            }
            "call" => {
                if self.name == INSTALLED_NAME && self.is_install_call(node) {
                    self.usage.has_binding = true;
                }
            }
            "for_statement" => {
                if let Some(left) = node.field("left") {
                    if binds(&left, self.name) {
                        self.record(&left, ShadowKind::ForLoop);
                    }
                }
            }
            "as_pattern" => {
                if let Some(alias) = node.field("alias") {
                    if binds(&alias, self.name) {
                        self.record(&alias, ShadowKind::Alias);
                    }
                }
            }
            _ => {}
        }

        for child in node.children() {
            self.walk(&child, in_function);
        }
    }

    /// `gettext.install(...)`, `gettext.translation(...).install()` or
    /// `t.install()` on a variable holding a translation object.
    fn is_install_call(&self, call: &PyNode<'_>) -> bool {
        let Some(function) = call.field("function") else {
            return false;
        };
        if function.kind() != "attribute"
            || !function.field("attribute").is_some_and(|a| a.text() == "install")
        {
            return false;
        }
        function.field("object").is_some_and(|object| {
            match object.kind().as_ref() {
                "identifier" => {
                    object.text() == "gettext" || self.translations.contains(&*object.text())
                }
                _ => self.is_translation(&object),
            }
        })
    }

    /// A call producing a translation object.
    fn is_translation(&self, node: &PyNode<'_>) -> bool {
        if node.kind() != "call" {
            return false;
        }
        let Some(function) = node.field("function") else {
            return false;
        };
        let callee = match function.kind().as_ref() {
            "identifier" => Some(function.clone()),
            "attribute" => function.field("attribute"),
            _ => None,
        };
        callee.is_some_and(|c| TRANSLATION_FACTORIES.contains(&c.text().as_ref()))
    }

    fn record(&mut self, node: &PyNode<'_>, kind: ShadowKind) {
        let line = self.source.span_of(node).start_line;
        self.usage.shadows.push(ShadowBinding {
            line,
            kind,
            line_text: self.source.line_text(line),
        });
    }
}

fn binds(target: &PyNode<'_>, name: &str) -> bool {
    target
        .dfs()
        .any(|n| n.kind() == "identifier" && n.text() == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(src: &str) -> ExternUsage {
        let parsed = ParsedSource::parse(src.as_bytes()).unwrap();
        extern_usage(&parsed, "_")
    }

    #[test]
    fn test_import_binding() {
        assert!(usage("from myapp.i18n import _\n").has_binding);
        assert!(usage("from gettext import gettext as _\n").has_binding);
        assert!(usage("import gettext\n_ = gettext.gettext\n").has_binding);
        assert!(!usage("import os\nprint(_('x'))\n").has_binding);
    }

    #[test]
    fn test_gettext_install_binds_underscore() {
        assert!(usage("import gettext\ngettext.install('app')\n").has_binding);
        assert!(
            usage("import gettext\ngettext.translation('app', 'locale').install()\n")
                .has_binding
        );
        assert!(
            usage("import gettext\nt = gettext.translation('app', fallback=True)\nt.install()\n")
                .has_binding
        );
        assert!(!usage("import gettext\nprint(_('x'))\n").has_binding);

        let parsed = ParsedSource::parse(b"import gettext\ngettext.install('app')\n").unwrap();
        assert!(!extern_usage(&parsed, "gettext_").has_binding);
    }

    #[test]
    fn test_shadowing_detected() {
        let src = concat!(
            "from myapp.i18n import _\n",
            "def run(items):\n",
            "    for _ in range(3):\n",
            "        pass\n",
            "    name, _ = items\n",
            "    _ = compute()\n",
        );
        let found = usage(src);
        assert!(found.has_binding);
        let kinds: Vec<ShadowKind> = found.shadows.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![ShadowKind::ForLoop, ShadowKind::Unpacking, ShadowKind::Assignment]
        );
        assert_eq!(found.shadows[0].line, 3);
    }

    #[test]
    fn test_parameter_shadowing() {
        let found = usage("def handler(_, event):\n    return event\n");
        assert_eq!(found.shadows.len(), 1);
        assert_eq!(found.shadows[0].kind, ShadowKind::Parameter);
    }
}
