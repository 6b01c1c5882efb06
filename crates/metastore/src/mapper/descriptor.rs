//! Field descriptors.
//!
//! A [`Descriptor`] is the per-type table the mapper walks instead of
//! inspecting types at runtime. Each [`FieldSpec`] carries the attribute id,
//! its cardinality and flags, plus a pair of accessors into the owning
//! struct. Descriptors are built once per type and kept in a static.

use super::context::{LoadContext, SaveContext};
use super::value::Mapped;
use crate::error::MapError;
use crate::model::{Attribute, AttributeContainer};
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

/// Attribute id of the key child in [`KeyConvention::FieldId`] entries.
pub const ENTRY_KEY: &str = "key";
/// Attribute id of the value child in [`KeyConvention::FieldId`] entries.
pub const ENTRY_VALUE: &str = "value";
/// Id of the lone child that marks a persisted empty field. An object whose
/// fields all saved nothing is a plain empty attribute, so the two never meet.
pub const EMPTY_MARKER: &str = "@empty";

fn empty_marker(id: &str) -> Attribute {
    Attribute::empty(id).with_child(Attribute::new(EMPTY_MARKER, true))
}

pub(crate) fn is_empty_marker(attr: &Attribute) -> bool {
    match attr.children.as_slice() {
        [only] => attr.value.is_none() && only.id == EMPTY_MARKER && only.children.is_empty(),
        _ => false,
    }
}

/// How many values a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Exactly one value, always saved.
    Single,
    /// `Option<M>`; `None` is saved as absence.
    Optional,
    /// Ordered collection: one repeated attribute per item.
    List,
    /// Keyed collection.
    Map,
}

/// Layout of keyed collections in the attribute tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyConvention {
    /// One container attribute with the field id; each entry is a child whose
    /// id is the key.
    #[default]
    KeyAsId,
    /// One attribute per entry, all sharing the field id, each holding a
    /// `key` and a `value` child.
    FieldId,
}

/// Static properties of a field, handed to its accessors.
#[derive(Debug, Clone, Copy)]
pub struct FieldMeta {
    /// Struct field name, used in failure paths.
    pub name: &'static str,
    /// Attribute id; defaults to the field name.
    pub id: &'static str,
    pub cardinality: Cardinality,
    pub sensitive: bool,
    pub persist_empty: bool,
    pub convention: KeyConvention,
}

type SaveFn<T> = Box<
    dyn Fn(&T, &FieldMeta, &mut SaveContext<'_>, &mut Vec<Attribute>) -> Result<(), MapError>
        + Send
        + Sync,
>;
type LoadFn<T> = Box<
    dyn Fn(&mut T, &FieldMeta, &[&Attribute], &mut LoadContext<'_>) -> Result<(), MapError>
        + Send
        + Sync,
>;

/// One persisted field of `T`.
pub struct FieldSpec<T> {
    meta: FieldMeta,
    save: SaveFn<T>,
    load: LoadFn<T>,
}

impl<T: 'static> FieldSpec<T> {
    fn build<S, L>(name: &'static str, cardinality: Cardinality, save: S, load: L) -> Self
    where
        S: Fn(&T, &FieldMeta, &mut SaveContext<'_>, &mut Vec<Attribute>) -> Result<(), MapError>
            + Send
            + Sync
            + 'static,
        L: Fn(&mut T, &FieldMeta, &[&Attribute], &mut LoadContext<'_>) -> Result<(), MapError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            meta: FieldMeta {
                name,
                id: name,
                cardinality,
                sensitive: false,
                persist_empty: false,
                convention: KeyConvention::default(),
            },
            save: Box::new(save),
            load: Box::new(load),
        }
    }

    /// A plain field holding one `M`.
    pub fn value<M: Mapped + 'static>(
        name: &'static str,
        get: fn(&T) -> &M,
        get_mut: fn(&mut T) -> &mut M,
    ) -> Self {
        Self::build(
            name,
            Cardinality::Single,
            move |obj, meta, ctx, out| {
                let tree = ctx.save_item(get(obj), meta)?;
                out.push(Attribute::from_tree(meta.id, tree));
                Ok(())
            },
            move |obj, meta, found, ctx| {
                if let Some(value) = load_first::<M>(meta, found, ctx)? {
                    *get_mut(obj) = value;
                }
                Ok(())
            },
        )
    }

    /// An `Option<M>` field.
    pub fn optional<M: Mapped + 'static>(
        name: &'static str,
        get: fn(&T) -> &Option<M>,
        get_mut: fn(&mut T) -> &mut Option<M>,
    ) -> Self {
        Self::build(
            name,
            Cardinality::Optional,
            move |obj, meta, ctx, out| {
                match get(obj) {
                    Some(item) => {
                        let tree = ctx.save_item(item, meta)?;
                        out.push(Attribute::from_tree(meta.id, tree));
                    }
                    None if meta.persist_empty => out.push(empty_marker(meta.id)),
                    None => {}
                }
                Ok(())
            },
            move |obj, meta, found, ctx| {
                if let Some(value) = load_first::<M>(meta, found, ctx)? {
                    *get_mut(obj) = Some(value);
                }
                Ok(())
            },
        )
    }

    /// A `Vec<M>` field, saved as one attribute per item in order.
    pub fn list<M: Mapped + 'static>(
        name: &'static str,
        get: fn(&T) -> &Vec<M>,
        get_mut: fn(&mut T) -> &mut Vec<M>,
    ) -> Self {
        Self::build(
            name,
            Cardinality::List,
            move |obj, meta, ctx, out| {
                let items = get(obj);
                if items.is_empty() && meta.persist_empty {
                    out.push(empty_marker(meta.id));
                }
                for (i, item) in items.iter().enumerate() {
                    ctx.path.push_index(i);
                    let tree = ctx.save_item(item, meta);
                    ctx.path.pop();
                    out.push(Attribute::from_tree(meta.id, tree?));
                }
                Ok(())
            },
            move |obj, meta, found, ctx| {
                let mut items = Vec::with_capacity(found.len());
                for (i, attr) in found.iter().enumerate() {
                    if is_empty_marker(attr) || (attr.is_empty() && !M::is_object()) {
                        continue;
                    }
                    ctx.path.push_index(i);
                    let item = ctx.load_item::<M>(attr, meta);
                    ctx.path.pop();
                    if let Some(item) = ctx.recover(item)? {
                        items.push(item);
                    }
                }
                *get_mut(obj) = items;
                Ok(())
            },
        )
    }

    /// A keyed collection (`BTreeMap<String, M>` or `HashMap<String, M>`).
    pub fn map<C: Keyed + 'static>(
        name: &'static str,
        get: fn(&T) -> &C,
        get_mut: fn(&mut T) -> &mut C,
    ) -> Self {
        Self::build(
            name,
            Cardinality::Map,
            move |obj, meta, ctx, out| save_map(get(obj), meta, ctx, out),
            move |obj, meta, found, ctx| {
                *get_mut(obj) = load_map::<C>(meta, found, ctx)?;
                Ok(())
            },
        )
    }

    /// Store under a different attribute id.
    pub fn id(mut self, id: &'static str) -> Self {
        self.meta.id = id;
        self
    }

    /// Pass values through the password encoder.
    pub fn sensitive(mut self) -> Self {
        self.meta.sensitive = true;
        self
    }

    /// Save an empty marker attribute instead of omitting the field.
    pub fn persist_empty(mut self) -> Self {
        self.meta.persist_empty = true;
        self
    }

    /// Use [`KeyConvention::FieldId`] for a keyed collection.
    pub fn keyed_by_field_id(mut self) -> Self {
        self.meta.convention = KeyConvention::FieldId;
        self
    }

    pub fn meta(&self) -> &FieldMeta {
        &self.meta
    }

    pub(crate) fn save(
        &self,
        obj: &T,
        ctx: &mut SaveContext<'_>,
        out: &mut Vec<Attribute>,
    ) -> Result<(), MapError> {
        (self.save)(obj, &self.meta, ctx, out)
    }

    pub(crate) fn load(
        &self,
        obj: &mut T,
        found: &[&Attribute],
        ctx: &mut LoadContext<'_>,
    ) -> Result<(), MapError> {
        (self.load)(obj, &self.meta, found, ctx)
    }
}

fn load_first<M: Mapped>(
    meta: &FieldMeta,
    found: &[&Attribute],
    ctx: &mut LoadContext<'_>,
) -> Result<Option<M>, MapError> {
    match found.first() {
        None => Ok(None),
        Some(attr) if is_empty_marker(attr) => Ok(None),
        Some(attr) if attr.is_empty() && !M::is_object() => Ok(None),
        Some(attr) => {
            let item = ctx.load_item::<M>(attr, meta);
            ctx.recover(item)
        }
    }
}

fn save_map<C: Keyed>(
    map: &C,
    meta: &FieldMeta,
    ctx: &mut SaveContext<'_>,
    out: &mut Vec<Attribute>,
) -> Result<(), MapError> {
    let entries = map.entries();
    if entries.is_empty() {
        if meta.persist_empty {
            out.push(empty_marker(meta.id));
        }
        return Ok(());
    }
    let mut container = Attribute::empty(meta.id);
    for (key, item) in entries {
        ctx.path.push_key(key);
        let tree = ctx.save_item(item, meta);
        ctx.path.pop();
        let tree = tree?;
        match meta.convention {
            KeyConvention::KeyAsId if key == EMPTY_MARKER => {
                return Err(MapError::ReservedKey {
                    path: ctx.path(),
                    key: key.to_string(),
                })
            }
            KeyConvention::KeyAsId => container.add_child(Attribute::from_tree(key, tree)),
            KeyConvention::FieldId => out.push(
                Attribute::empty(meta.id)
                    .with_child(Attribute::new(ENTRY_KEY, key))
                    .with_child(Attribute::from_tree(ENTRY_VALUE, tree)),
            ),
        }
    }
    if meta.convention == KeyConvention::KeyAsId {
        out.push(container);
    }
    Ok(())
}

fn load_map<C: Keyed>(
    meta: &FieldMeta,
    found: &[&Attribute],
    ctx: &mut LoadContext<'_>,
) -> Result<C, MapError> {
    let mut map = C::default();
    match meta.convention {
        KeyConvention::KeyAsId => {
            let Some(container) = found.first().filter(|c| !is_empty_marker(c)) else {
                return Ok(map);
            };
            for entry in &container.children {
                if entry.is_empty() && !<C::Item as Mapped>::is_object() {
                    continue;
                }
                ctx.path.push_key(&entry.id);
                let item = ctx.load_item::<C::Item>(entry, meta);
                ctx.path.pop();
                if let Some(item) = ctx.recover(item)? {
                    map.insert_entry(entry.id.clone(), item);
                }
            }
        }
        KeyConvention::FieldId => {
            for (i, entry) in found.iter().enumerate() {
                if entry.is_empty() || is_empty_marker(entry) {
                    continue;
                }
                ctx.path.push_index(i);
                let key = entry
                    .child(ENTRY_KEY)
                    .and_then(|k| k.value.as_ref())
                    .map(|v| v.to_string());
                let item = match (key.as_ref(), entry.child(ENTRY_VALUE)) {
                    (None, _) => Err(ctx.missing("map entry key")),
                    (Some(_), Some(value)) => ctx.load_item::<C::Item>(value, meta).map(Some),
                    (Some(_), None) if <C::Item as Mapped>::is_object() => {
                        ctx.load_item::<C::Item>(&Attribute::empty(ENTRY_VALUE), meta).map(Some)
                    }
                    (Some(_), None) => Ok(None),
                };
                ctx.path.pop();
                if let (Some(key), Some(Some(item))) = (key, ctx.recover(item)?) {
                    map.insert_entry(key, item);
                }
            }
        }
    }
    Ok(map)
}

/// Keyed collections the mapper can fill.
pub trait Keyed: Default {
    type Item: Mapped;

    /// Entries in save order.
    fn entries(&self) -> Vec<(&str, &Self::Item)>;

    fn insert_entry(&mut self, key: String, item: Self::Item);
}

impl<M: Mapped> Keyed for BTreeMap<String, M> {
    type Item = M;

    fn entries(&self) -> Vec<(&str, &M)> {
        self.iter().map(|(k, v)| (k.as_str(), v)).collect()
    }

    fn insert_entry(&mut self, key: String, item: M) {
        self.insert(key, item);
    }
}

impl<M: Mapped, S: BuildHasher + Default> Keyed for HashMap<String, M, S> {
    type Item = M;

    /// Sorted by key so saved trees are stable.
    fn entries(&self) -> Vec<(&str, &M)> {
        let mut entries: Vec<_> = self.iter().map(|(k, v)| (k.as_str(), v)).collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    fn insert_entry(&mut self, key: String, item: M) {
        self.insert(key, item);
    }
}

/// The field table of one mapped type.
pub struct Descriptor<T> {
    type_name: &'static str,
    description: &'static str,
    name_field: &'static str,
    fields: Vec<FieldSpec<T>>,
}

impl<T: 'static> Descriptor<T> {
    /// `type_name` doubles as the element type id when objects of this type
    /// are stored through a factory.
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            description: "",
            name_field: "name",
            fields: Vec::new(),
        }
    }

    pub fn description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Attribute id whose value names the element (default `name`).
    pub fn name_field(mut self, id: &'static str) -> Self {
        self.name_field = id;
        self
    }

    pub fn field(mut self, field: FieldSpec<T>) -> Self {
        self.fields.push(field);
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn type_description(&self) -> &'static str {
        self.description
    }

    pub fn name_field_id(&self) -> &'static str {
        self.name_field
    }

    pub fn fields(&self) -> &[FieldSpec<T>] {
        &self.fields
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldSpec<T>> {
        self.fields.iter().find(|f| f.meta.name == name)
    }
}
