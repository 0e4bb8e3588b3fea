//! Arena-backed object model: sets, objects, attributes and their values.
//!
//! Every entity lives in a typed [`Pool`] and refers to others by handle.
//! Sets form a top-level sibling chain; a file header set (FHLR) starts a
//! new root and the sets that follow it are chained as its children until
//! the next file header.

use anyhow::Result;

use crate::structs::rep_code::RepCode;
use crate::structs::segment::FHLR;
use crate::structs::value::{ObjectName, Value};
use crate::utils::arena::{Id, Pool, Span};

pub type SetId = Id<Set>;
pub type ObjectId = Id<Object>;
pub type AttributeId = Id<Attribute>;

#[derive(Debug, Clone, PartialEq)]
pub struct Set {
    /// Logical record type of the EFLR that declared this set.
    pub record_type: u8,
    pub set_type: String,
    pub name: Option<String>,
    /// Template attributes shared by every object of the set.
    pub columns: Vec<AttributeId>,
    pub objects: Vec<ObjectId>,
    pub next: Option<SetId>,
    pub first_child: Option<SetId>,
}

impl Set {
    pub fn new(record_type: u8, set_type: String, name: Option<String>) -> Self {
        Self {
            record_type,
            set_type,
            name,
            columns: Vec::new(),
            objects: Vec::new(),
            next: None,
            first_child: None,
        }
    }

    pub fn is_file_header(&self) -> bool {
        self.record_type == FHLR
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub name: ObjectName,
    pub set: SetId,
    pub attributes: Vec<AttributeId>,
}

/// A template column (owned by a set) or an instance attribute (owned by
/// an object).
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub label: String,
    pub count: u32,
    /// `None` when the code was unknown or could not be resolved.
    pub code: Option<RepCode>,
    pub units: Option<String>,
    pub values: Span<Value>,
    /// Declared with the absent-attribute role.
    pub absent: bool,
}

/// Initial element capacity of each model pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolHints {
    pub sets: usize,
    pub objects: usize,
    pub attributes: usize,
    pub values: usize,
    pub frame_layouts: usize,
}

impl Default for PoolHints {
    fn default() -> Self {
        Self {
            sets: 256,
            objects: 4 * 1024,
            attributes: 32 * 1024,
            values: 32 * 1024,
            frame_layouts: 32,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelCounts {
    pub sets: usize,
    pub objects: usize,
    pub attributes: usize,
    pub values: usize,
}

#[derive(Debug)]
pub struct Model {
    sets: Pool<Set>,
    objects: Pool<Object>,
    attributes: Pool<Attribute>,
    values: Pool<Value>,

    first_top: Option<SetId>,
    last_top: Option<SetId>,
    current_root: Option<SetId>,
    last_child: Option<SetId>,
}

impl Model {
    pub fn with_hints(hints: &PoolHints) -> Result<Self> {
        Ok(Self {
            sets: Pool::with_capacity(hints.sets)?,
            objects: Pool::with_capacity(hints.objects)?,
            attributes: Pool::with_capacity(hints.attributes)?,
            values: Pool::with_capacity(hints.values)?,
            first_top: None,
            last_top: None,
            current_root: None,
            last_child: None,
        })
    }

    /// Links a new set into the tree.
    ///
    /// A file header set is appended to the top-level chain and becomes the
    /// current root. Any other set becomes the last child of the current
    /// root, or joins the top-level chain if no root has been seen yet.
    pub fn add_set(&mut self, set: Set) -> SetId {
        let is_root = set.is_file_header();
        let id = self.sets.alloc(set);

        if is_root || self.current_root.is_none() {
            match self.last_top {
                Some(last) => self.sets.get_mut(last).next = Some(id),
                None => self.first_top = Some(id),
            }
            self.last_top = Some(id);

            if is_root {
                self.current_root = Some(id);
                self.last_child = None;
            }
        } else if let Some(root) = self.current_root {
            match self.last_child {
                Some(last) => self.sets.get_mut(last).next = Some(id),
                None => self.sets.get_mut(root).first_child = Some(id),
            }
            self.last_child = Some(id);
        }

        id
    }

    pub fn add_object(&mut self, set: SetId, name: ObjectName) -> ObjectId {
        let id = self.objects.alloc(Object {
            name,
            set,
            attributes: Vec::new(),
        });
        self.sets.get_mut(set).objects.push(id);
        id
    }

    pub fn add_column(&mut self, set: SetId, column: Attribute) -> AttributeId {
        let id = self.attributes.alloc(column);
        self.sets.get_mut(set).columns.push(id);
        id
    }

    pub fn add_attribute(&mut self, object: ObjectId, attribute: Attribute) -> AttributeId {
        let id = self.attributes.alloc(attribute);
        self.objects.get_mut(object).attributes.push(id);
        id
    }

    pub fn alloc_values(&mut self, values: Vec<Value>) -> Span<Value> {
        self.values.alloc_extend(values)
    }

    pub fn set(&self, id: SetId) -> &Set {
        self.sets.get(id)
    }

    pub fn object(&self, id: ObjectId) -> &Object {
        self.objects.get(id)
    }

    pub fn attribute(&self, id: AttributeId) -> &Attribute {
        self.attributes.get(id)
    }

    pub fn values(&self, id: AttributeId) -> &[Value] {
        self.values.slice(self.attributes.get(id).values)
    }

    /// First set of the top-level chain.
    pub fn root(&self) -> Option<SetId> {
        self.first_top
    }

    /// Most recent file header set.
    pub fn current_root(&self) -> Option<SetId> {
        self.current_root
    }

    pub fn top_level(&self) -> Siblings<'_> {
        Siblings {
            model: self,
            next: self.first_top,
        }
    }

    pub fn children(&self, set: SetId) -> Siblings<'_> {
        Siblings {
            model: self,
            next: self.set(set).first_child,
        }
    }

    /// Sets belonging to a logical file: the children of `root`, or the
    /// top-level chain when there is no root.
    pub fn scope(&self, root: Option<SetId>) -> Siblings<'_> {
        match root {
            Some(root) => self.children(root),
            None => self.top_level(),
        }
    }

    /// First set of the given type in scope.
    pub fn find_subset(&self, root: Option<SetId>, set_type: &str) -> Option<SetId> {
        self.scope(root)
            .find(|&id| self.set(id).set_type == set_type)
    }

    pub fn find_object(&self, set: SetId, name: &ObjectName) -> Option<ObjectId> {
        self.set(set)
            .objects
            .iter()
            .copied()
            .find(|&id| self.object(id).name == *name)
    }

    /// Searches every set of `set_type` in scope for the named object.
    pub fn find_typed_object(
        &self,
        root: Option<SetId>,
        set_type: &str,
        name: &ObjectName,
    ) -> Option<ObjectId> {
        self.scope(root)
            .filter(|&id| self.set(id).set_type == set_type)
            .find_map(|id| self.find_object(id, name))
    }

    /// Finds an attribute by its column label. Falls back to the column
    /// itself when the object stops short of that column.
    pub fn find_attribute(&self, object: ObjectId, label: &str) -> Option<AttributeId> {
        let object = self.object(object);
        let columns = &self.set(object.set).columns;

        let ordinal = columns
            .iter()
            .position(|&column| self.attribute(column).label == label)?;

        Some(
            object
                .attributes
                .get(ordinal)
                .copied()
                .unwrap_or(columns[ordinal]),
        )
    }

    /// Values joined by spaces, followed by units when present.
    pub fn attribute_string(&self, id: AttributeId) -> String {
        let mut text = self
            .values(id)
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");

        if let Some(units) = &self.attribute(id).units {
            if !units.is_empty() && !text.is_empty() {
                text.push(' ');
                text.push_str(units);
            }
        }

        text
    }

    /// First value as an integer.
    pub fn attribute_int(&self, id: AttributeId) -> Option<i64> {
        self.values(id).first().and_then(Value::as_i64)
    }

    pub fn counts(&self) -> ModelCounts {
        ModelCounts {
            sets: self.sets.len(),
            objects: self.objects.len(),
            attributes: self.attributes.len(),
            values: self.values.len(),
        }
    }

    /// Drops every entity. Handles from before the call become invalid.
    pub fn release(&mut self) {
        self.sets.release_all();
        self.objects.release_all();
        self.attributes.release_all();
        self.values.release_all();
        self.first_top = None;
        self.last_top = None;
        self.current_root = None;
        self.last_child = None;
    }
}

/// Iterator over a sibling chain of sets.
pub struct Siblings<'a> {
    model: &'a Model,
    next: Option<SetId>,
}

impl Iterator for Siblings<'_> {
    type Item = SetId;

    fn next(&mut self) -> Option<SetId> {
        let current = self.next?;
        self.next = self.model.set(current).next;
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::segment::{CHANNL, FRAME, OLR};

    fn column(label: &str, code: RepCode) -> Attribute {
        Attribute {
            label: label.to_string(),
            count: 1,
            code: Some(code),
            units: None,
            values: Span::empty(),
            absent: false,
        }
    }

    #[test]
    fn file_headers_start_new_roots() {
        let mut model = Model::with_hints(&PoolHints::default()).unwrap();

        let loose = model.add_set(Set::new(OLR, "ORIGIN".into(), None));
        let first = model.add_set(Set::new(FHLR, "FILE-HEADER".into(), None));
        let frame = model.add_set(Set::new(FRAME, "FRAME".into(), None));
        let channel = model.add_set(Set::new(CHANNL, "CHANNEL".into(), None));
        let second = model.add_set(Set::new(FHLR, "FILE-HEADER".into(), None));

        assert_eq!(model.root(), Some(loose));
        assert_eq!(model.current_root(), Some(second));
        assert_eq!(
            model.top_level().collect::<Vec<_>>(),
            [loose, first, second]
        );
        assert_eq!(model.children(first).collect::<Vec<_>>(), [frame, channel]);
        assert_eq!(model.children(second).count(), 0);
        assert_eq!(model.find_subset(Some(first), "CHANNEL"), Some(channel));
        assert_eq!(model.find_subset(Some(second), "CHANNEL"), None);
    }

    #[test]
    fn lookups_and_helpers() {
        let mut model = Model::with_hints(&PoolHints::default()).unwrap();
        let set = model.add_set(Set::new(CHANNL, "CHANNEL".into(), None));
        model.add_column(set, column("LONG-NAME", RepCode::Ascii));
        let dims = model.add_column(set, column("DIMENSION", RepCode::Uvari));

        let gr = ObjectName::new(2, 0, "GR");
        let object = model.add_object(set, gr.clone());
        let values = model.alloc_values(vec![Value::Ascii("Gamma Ray".into())]);
        model.add_attribute(
            object,
            Attribute {
                units: Some("gAPI".into()),
                values,
                ..column("LONG-NAME", RepCode::Ascii)
            },
        );

        assert_eq!(model.find_object(set, &gr), Some(object));
        assert_eq!(model.find_object(set, &ObjectName::new(1, 0, "GR")), None);

        let long_name = model.find_attribute(object, "LONG-NAME").unwrap();
        assert_eq!(model.attribute_string(long_name), "Gamma Ray gAPI");

        // Object stops short of DIMENSION; the column answers.
        assert_eq!(model.find_attribute(object, "DIMENSION"), Some(dims));
        assert_eq!(model.find_attribute(object, "MISSING"), None);

        assert_eq!(
            model.counts(),
            ModelCounts {
                sets: 1,
                objects: 1,
                attributes: 3,
                values: 1
            }
        );

        model.release();
        assert_eq!(model.counts(), ModelCounts::default());
        assert_eq!(model.root(), None);
    }
}
