use crate::export::TextFormat;
use crate::path::Path;
use crate::schema::{BlockCategory, PrimitiveKind};
use serde_json::Value;

/// What an "add" control does when activated.
#[derive(Debug, Clone, PartialEq)]
pub enum AddKind {
    /// Open the block picker for `category` and insert the chosen block.
    Block {
        category: BlockCategory,
        is_array: bool,
    },
    /// Append `template` to the sequence.
    Item { template: Value },
}

/// An "add" control attached to a widget.
#[derive(Debug, Clone, PartialEq)]
pub struct AddAffordance {
    pub label: String,
    pub target: Path,
    pub kind: AddKind,
}

impl AddAffordance {
    pub fn block(category: BlockCategory, target: Path, is_array: bool) -> Self {
        Self {
            label: format!("Add {}", category),
            target,
            kind: AddKind::Block { category, is_array },
        }
    }

    pub fn item(target: Path, template: Value) -> Self {
        Self {
            label: "+ Add Item".to_string(),
            target,
            kind: AddKind::Item { template },
        }
    }
}

/// Lets the user add an undeclared key to a free-form object.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyAdder {
    pub path: Path,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldView {
    pub key: String,
    pub widget: Widget,
}

/// How a nested module came to be rendered.
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleRole {
    /// A plain nested object or the top-level document.
    Object,
    /// An element of an object list.
    ListItem,
    /// A block instance; `name` is unknown until the instance names one.
    Block {
        category: BlockCategory,
        name: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModuleBody {
    Fields {
        fields: Vec<FieldView>,
        adder: Option<PropertyAdder>,
    },
    Text {
        format: TextFormat,
        text: String,
        error: Option<String>,
    },
    /// The schema for this module is not known yet.
    Pending { loading: bool },
}

/// A nested module editor as it currently presents itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleView {
    pub path: Path,
    pub title: Option<String>,
    pub role: ModuleRole,
    pub removable: bool,
    pub error: Option<String>,
    pub body: ModuleBody,
}

/// The editor control chosen for one schema fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum Widget {
    BlockList {
        path: Path,
        category: BlockCategory,
        items: Vec<Widget>,
        add: AddAffordance,
    },
    PrimitiveList {
        path: Path,
        kind: PrimitiveKind,
        items: Vec<Widget>,
        add: AddAffordance,
    },
    ObjectList {
        path: Path,
        items: Vec<Widget>,
        add: AddAffordance,
    },
    RawJson {
        path: Path,
        text: String,
    },
    BlockSlot {
        path: Path,
        category: BlockCategory,
        instance: Option<Box<Widget>>,
        add: Option<AddAffordance>,
    },
    Module(ModuleView),
    Checkbox {
        path: Path,
        checked: bool,
    },
    Number {
        path: Path,
        value: Option<f64>,
        integer: bool,
    },
    Select {
        path: Path,
        options: Vec<String>,
        selected: Option<String>,
    },
    Text {
        path: Path,
        value: String,
        diagnostic: Option<String>,
    },
}

impl Widget {
    pub fn path(&self) -> &Path {
        match self {
            Widget::BlockList { path, .. }
            | Widget::PrimitiveList { path, .. }
            | Widget::ObjectList { path, .. }
            | Widget::RawJson { path, .. }
            | Widget::BlockSlot { path, .. }
            | Widget::Checkbox { path, .. }
            | Widget::Number { path, .. }
            | Widget::Select { path, .. }
            | Widget::Text { path, .. } => path,
            Widget::Module(view) => &view.path,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Widget::BlockList { .. } => "block-list",
            Widget::PrimitiveList { .. } => "primitive-list",
            Widget::ObjectList { .. } => "object-list",
            Widget::RawJson { .. } => "raw-json",
            Widget::BlockSlot { .. } => "block-slot",
            Widget::Module(_) => "module",
            Widget::Checkbox { .. } => "checkbox",
            Widget::Number { .. } => "number",
            Widget::Select { .. } => "select",
            Widget::Text { .. } => "text",
        }
    }

    /// The add control this widget itself carries, if any.
    pub fn affordance(&self) -> Option<&AddAffordance> {
        match self {
            Widget::BlockList { add, .. }
            | Widget::PrimitiveList { add, .. }
            | Widget::ObjectList { add, .. } => Some(add),
            Widget::BlockSlot { add, .. } => add.as_ref(),
            _ => None,
        }
    }

    /// Direct children, in display order.
    pub fn children(&self) -> Vec<&Widget> {
        match self {
            Widget::BlockList { items, .. }
            | Widget::PrimitiveList { items, .. }
            | Widget::ObjectList { items, .. } => items.iter().collect(),
            Widget::BlockSlot { instance, .. } => instance.iter().map(|w| w.as_ref()).collect(),
            Widget::Module(ModuleView {
                body: ModuleBody::Fields { fields, .. },
                ..
            }) => fields.iter().map(|f| &f.widget).collect(),
            _ => Vec::new(),
        }
    }

    /// Depth-first search for the widget rendered at `path`.
    pub fn find(&self, path: &Path) -> Option<&Widget> {
        if self.path() == path {
            return Some(self);
        }
        self.children().into_iter().find_map(|child| child.find(path))
    }

    /// Every add control in the tree.
    pub fn affordances(&self) -> Vec<&AddAffordance> {
        let mut found = Vec::new();
        self.walk(&mut |w| {
            if let Some(add) = w.affordance() {
                found.push(add);
            }
        });
        found
    }

    /// Modules still waiting for their schema.
    pub fn pending_modules(&self) -> Vec<&ModuleView> {
        let mut found = Vec::new();
        self.walk(&mut |w| {
            if let Widget::Module(
                view @ ModuleView {
                    body: ModuleBody::Pending { .. },
                    ..
                },
            ) = w
            {
                found.push(view);
            }
        });
        found
    }

    fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Widget)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }
}
