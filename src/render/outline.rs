use super::{FieldView, ModuleBody, ModuleRole, ModuleView, Widget};
use crate::render::AddAffordance;

/// Formats a widget tree as an indented, human-readable outline.
pub struct WidgetOutline;

impl WidgetOutline {
    pub fn format(widget: &Widget) -> String {
        let mut out = String::new();
        Self::format_recursive(widget, None, 0, &mut out);
        out
    }

    fn format_recursive(widget: &Widget, label: Option<&str>, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        let prefix = label.map_or(String::new(), |l| format!("{}: ", l));

        match widget {
            Widget::Module(view) => {
                out.push_str(&format!("{}{}{}\n", indent, prefix, Self::module_header(view)));
                match &view.body {
                    ModuleBody::Fields { fields, adder } => {
                        for FieldView { key, widget } in fields {
                            Self::format_recursive(widget, Some(key), depth + 1, out);
                        }
                        if adder.is_some() {
                            out.push_str(&format!("{}  [+ Add Property]\n", indent));
                        }
                    }
                    ModuleBody::Text {
                        format,
                        text,
                        error,
                    } => {
                        out.push_str(&format!("{}  <{} text, {} bytes>\n", indent, format, text.len()));
                        if let Some(error) = error {
                            out.push_str(&format!("{}  ! {}\n", indent, error));
                        }
                    }
                    ModuleBody::Pending { loading } => {
                        let state = if *loading { "loading" } else { "pending" };
                        out.push_str(&format!("{}  <{}>\n", indent, state));
                    }
                }
                return;
            }
            Widget::Text {
                value, diagnostic, ..
            } => {
                out.push_str(&format!("{}{}text {:?}\n", indent, prefix, value));
                if let Some(diagnostic) = diagnostic {
                    out.push_str(&format!("{}  ! {}\n", indent, diagnostic));
                }
            }
            Widget::Number { value, integer, .. } => {
                let kind = if *integer { "integer" } else { "number" };
                let shown = value.map_or("-".to_string(), |v| v.to_string());
                out.push_str(&format!("{}{}{} {}\n", indent, prefix, kind, shown));
            }
            Widget::Checkbox { checked, .. } => {
                let mark = if *checked { "x" } else { " " };
                out.push_str(&format!("{}{}checkbox [{}]\n", indent, prefix, mark));
            }
            Widget::Select {
                options, selected, ..
            } => {
                out.push_str(&format!(
                    "{}{}select {} of [{}]\n",
                    indent,
                    prefix,
                    selected.as_deref().unwrap_or("-"),
                    options.join(", ")
                ));
            }
            Widget::RawJson { text, .. } => {
                out.push_str(&format!("{}{}raw-json {}\n", indent, prefix, text.replace('\n', " ")));
            }
            Widget::BlockSlot { category, .. } => {
                out.push_str(&format!("{}{}block-slot {}\n", indent, prefix, category));
            }
            Widget::BlockList {
                category, items, ..
            } => {
                out.push_str(&format!(
                    "{}{}block-list {} ({} items)\n",
                    indent,
                    prefix,
                    category,
                    items.len()
                ));
            }
            Widget::PrimitiveList { kind, items, .. } => {
                out.push_str(&format!(
                    "{}{}{}-list ({} items)\n",
                    indent,
                    prefix,
                    kind,
                    items.len()
                ));
            }
            Widget::ObjectList { items, .. } => {
                out.push_str(&format!("{}{}object-list ({} items)\n", indent, prefix, items.len()));
            }
        }

        for child in widget.children() {
            Self::format_recursive(child, None, depth + 1, out);
        }
        if let Some(AddAffordance { label, .. }) = widget.affordance() {
            out.push_str(&format!("{}  [{}]\n", indent, label));
        }
    }

    fn module_header(view: &ModuleView) -> String {
        let role = match &view.role {
            ModuleRole::Object => "object".to_string(),
            ModuleRole::ListItem => "item".to_string(),
            ModuleRole::Block { category, name } => match name {
                Some(name) => format!("{} {}", category, name),
                None => category.to_string(),
            },
        };
        let mut header = format!("module {} ({})", view.path, role);
        if view.removable {
            header.push_str(" [remove]");
        }
        if let Some(error) = &view.error {
            header.push_str(&format!(" ! {}", error));
        }
        header
    }
}
