use chrono::{DateTime, TimeZone, Utc};
use metastore::mapper::{Descriptor, FieldSpec, Mapper, MetaStoreObject};
use metastore::store::fs::FsMetaStore;
use metastore::store::memory::MemoryMetaStore;
use metastore::{
    mapped_enum, mapped_object, AttributeContainer, ElementFactory, MapError, MetaStore,
    MetaStoreError, TwoWayPasswordEncoder, Value,
};
use once_cell::sync::OnceCell;
use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Debug, Default, Clone, Copy, PartialEq)]
enum DimensionType {
    #[default]
    Other,
    Time,
    Geography,
}

mapped_enum!(DimensionType { Other, Time, Geography });

#[derive(Debug, Default, Clone, PartialEq)]
struct DimensionAttribute {
    name: String,
    description: String,
    some_other_stuff: Option<String>,
}

impl MetaStoreObject for DimensionAttribute {
    fn descriptor() -> &'static Descriptor<Self> {
        static DESCRIPTOR: OnceCell<Descriptor<DimensionAttribute>> = OnceCell::new();
        DESCRIPTOR.get_or_init(|| {
            Descriptor::new("DimensionAttribute")
                .field(FieldSpec::value("name", |a: &Self| &a.name, |a: &mut Self| &mut a.name))
                .field(FieldSpec::value(
                    "description",
                    |a: &Self| &a.description,
                    |a: &mut Self| &mut a.description,
                ))
                .field(FieldSpec::optional(
                    "some_other_stuff",
                    |a: &Self| &a.some_other_stuff,
                    |a: &mut Self| &mut a.some_other_stuff,
                ))
        })
    }
}

mapped_object!(DimensionAttribute);

#[derive(Debug, Default, Clone, PartialEq)]
struct Dimension {
    name: String,
    dimension_type: DimensionType,
    shared: bool,
    created: Option<DateTime<Utc>>,
    connection_password: Option<String>,
    attributes: Vec<DimensionAttribute>,
    options: BTreeMap<String, String>,
}

impl MetaStoreObject for Dimension {
    fn descriptor() -> &'static Descriptor<Self> {
        static DESCRIPTOR: OnceCell<Descriptor<Dimension>> = OnceCell::new();
        DESCRIPTOR.get_or_init(|| {
            Descriptor::new("Dimension")
                .description("A cube dimension")
                .field(FieldSpec::value("name", |d: &Self| &d.name, |d: &mut Self| &mut d.name))
                .field(
                    FieldSpec::value(
                        "dimension_type",
                        |d: &Self| &d.dimension_type,
                        |d: &mut Self| &mut d.dimension_type,
                    )
                    .id("type"),
                )
                .field(FieldSpec::value("shared", |d: &Self| &d.shared, |d: &mut Self| &mut d.shared))
                .field(FieldSpec::optional(
                    "created",
                    |d: &Self| &d.created,
                    |d: &mut Self| &mut d.created,
                ))
                .field(
                    FieldSpec::optional(
                        "connection_password",
                        |d: &Self| &d.connection_password,
                        |d: &mut Self| &mut d.connection_password,
                    )
                    .id("password")
                    .sensitive(),
                )
                .field(
                    FieldSpec::list(
                        "attributes",
                        |d: &Self| &d.attributes,
                        |d: &mut Self| &mut d.attributes,
                    )
                    .id("attribute"),
                )
                .field(
                    FieldSpec::map("options", |d: &Self| &d.options, |d: &mut Self| &mut d.options)
                        .keyed_by_field_id(),
                )
        })
    }
}

mapped_object!(Dimension);

fn attribute(name: &str) -> DimensionAttribute {
    DimensionAttribute {
        name: name.to_string(),
        description: format!("{} level", name),
        some_other_stuff: None,
    }
}

fn time_dimension() -> Dimension {
    Dimension {
        name: "time".to_string(),
        dimension_type: DimensionType::Time,
        shared: true,
        created: Some(Utc.with_ymd_and_hms(2013, 5, 1, 8, 0, 0).unwrap()),
        connection_password: Some("secret".to_string()),
        attributes: vec![attribute("year"), attribute("quarter"), attribute("month")],
        options: BTreeMap::from([
            ("fiscal".to_string(), "false".to_string()),
            ("week_start".to_string(), "monday".to_string()),
        ]),
    }
}

#[test]
fn test_factory_round_trip_on_disk() {
    let dir = TempDir::new().unwrap();
    let store = FsMetaStore::new(dir.path());
    let factory = ElementFactory::<Dimension>::new(&store, "pentaho");

    factory.save(&time_dimension()).unwrap();
    assert_eq!(factory.load("time").unwrap(), Some(time_dimension()));

    let element_type = factory.element_type().unwrap();
    assert_eq!(element_type.id, "Dimension");
    assert_eq!(element_type.description, "A cube dimension");
}

#[test]
fn test_password_never_reaches_disk_in_plain_text() {
    let dir = TempDir::new().unwrap();
    let store = FsMetaStore::new(dir.path());
    let factory = ElementFactory::<Dimension>::new(&store, "pentaho");
    factory.save(&time_dimension()).unwrap();

    let on_disk = fs::read_to_string(store.element_path("pentaho", "Dimension", "time")).unwrap();
    assert!(!on_disk.contains("secret"));
    assert_eq!(
        factory.load("time").unwrap().unwrap().connection_password.as_deref(),
        Some("secret")
    );
}

#[test]
fn test_attribute_order_is_preserved() {
    let store = MemoryMetaStore::default();
    let factory = ElementFactory::<Dimension>::new(&store, "pentaho");
    let element = factory.save(&time_dimension()).unwrap();

    let names: Vec<_> = element
        .children_with_id("attribute")
        .map(|a| a.child("name").unwrap().value.clone().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![Value::from("year"), Value::from("quarter"), Value::from("month")]
    );

    let loaded = factory.load("time").unwrap().unwrap();
    let loaded_names: Vec<_> = loaded.attributes.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(loaded_names, vec!["year", "quarter", "month"]);
}

#[test]
fn test_tolerant_load_surfaces_failing_path() {
    let dir = TempDir::new().unwrap();
    let store = FsMetaStore::new(dir.path());
    let factory = ElementFactory::<Dimension>::new(&store, "pentaho");
    let mut element = factory.save(&time_dimension()).unwrap();

    element.child_mut("type").unwrap().value = Some(Value::from("Galaxy"));
    element.child_mut("shared").unwrap().value = Some(Value::Integer(7));
    let element_type = factory.element_type().unwrap();
    store
        .update_element("pentaho", &element_type, "time", &element)
        .unwrap();

    let loaded = factory.load_detailed("time").unwrap().unwrap();
    let paths: Vec<_> = loaded.failures.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["dimension_type", "shared"]);
    assert_eq!(loaded.value.dimension_type, DimensionType::Other);
    assert!(!loaded.value.shared);
    assert_eq!(loaded.value.attributes.len(), 3);

    let strict = ElementFactory::<Dimension>::new(&store, "pentaho").strict(true);
    match strict.load("time") {
        Err(MetaStoreError::Mapping(MapError::Coercion(f))) => {
            assert_eq!(f.path, "dimension_type");
            assert_eq!(f.expected, "DimensionType");
        }
        other => panic!("expected coercion failure, got {:?}", other),
    }
}

#[test]
fn test_nested_failure_path_includes_index() {
    let store = MemoryMetaStore::default();
    let factory = ElementFactory::<Dimension>::new(&store, "pentaho");
    let mut element = factory.save(&time_dimension()).unwrap();

    let second = element
        .children
        .iter_mut()
        .filter(|a| a.id == "attribute")
        .nth(1)
        .unwrap();
    second.child_mut("name").unwrap().children.push(metastore::Attribute::new("x", 1i64));
    second.child_mut("name").unwrap().value = None;

    let loaded = factory.mapper().from_element::<Dimension>(&element).unwrap();
    assert_eq!(loaded.failures.len(), 1);
    assert_eq!(loaded.failures[0].path, "attributes[1].name");
}

#[test]
fn test_load_all_with_one_corrupt_file() {
    let dir = TempDir::new().unwrap();
    let store = FsMetaStore::new(dir.path());
    let factory = ElementFactory::<Dimension>::new(&store, "pentaho");
    for name in ["customer", "product", "time"] {
        let mut dim = time_dimension();
        dim.name = name.to_string();
        factory.save(&dim).unwrap();
    }
    fs::write(store.element_path("pentaho", "Dimension", "product"), "garbage").unwrap();

    let mut failures = Vec::new();
    let loaded = factory.load_all(&mut failures).unwrap();
    let names: Vec<_> = loaded.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["customer", "time"]);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].element_id, "product");
}

struct Reversing;

impl TwoWayPasswordEncoder for Reversing {
    fn encode(&self, plain: &str) -> String {
        plain.chars().rev().collect()
    }

    fn decode(&self, cipher: &str) -> Option<String> {
        Some(cipher.chars().rev().collect())
    }
}

#[test]
fn test_store_encoder_is_used_by_factory() {
    let mut store = MemoryMetaStore::default();
    store.set_password_encoder(Arc::new(Reversing));
    let factory = ElementFactory::<Dimension>::new(&store, "pentaho");
    let element = factory.save(&time_dimension()).unwrap();

    assert_eq!(
        element.child("password").unwrap().value,
        Some(Value::from("terces"))
    );
    assert_eq!(factory.load("time").unwrap(), Some(time_dimension()));
}

#[test]
fn test_mapper_without_store() {
    let mapper = Mapper::default();
    let tree = mapper.to_tree(&time_dimension()).unwrap();

    let options: Vec<_> = tree.children_with_id("options").collect();
    assert_eq!(options.len(), 2);
    assert!(tree.child("created").is_some());

    let loaded = mapper.from_tree::<Dimension>(&tree).unwrap();
    assert!(loaded.is_complete());
    assert_eq!(loaded.into_inner(), time_dimension());
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Measure {
    name: String,
    weight: f64,
    scale: f32,
}

impl MetaStoreObject for Measure {
    fn descriptor() -> &'static Descriptor<Self> {
        static DESCRIPTOR: OnceCell<Descriptor<Measure>> = OnceCell::new();
        DESCRIPTOR.get_or_init(|| {
            Descriptor::new("Measure")
                .field(FieldSpec::value("name", |m: &Self| &m.name, |m: &mut Self| &mut m.name))
                .field(FieldSpec::value("weight", |m: &Self| &m.weight, |m: &mut Self| &mut m.weight))
                .field(FieldSpec::value("scale", |m: &Self| &m.scale, |m: &mut Self| &mut m.scale))
        })
    }
}

#[test]
fn test_non_finite_floats_survive_disk() {
    let dir = TempDir::new().unwrap();
    let store = FsMetaStore::new(dir.path());
    let factory = ElementFactory::<Measure>::new(&store, "pentaho");
    for (name, weight) in [("nan", f64::NAN), ("up", f64::INFINITY), ("ok", 2.5)] {
        factory
            .save(&Measure {
                name: name.to_string(),
                weight,
                scale: f32::NEG_INFINITY,
            })
            .unwrap();
    }

    let nan = factory.load_detailed("nan").unwrap().unwrap();
    assert!(nan.is_complete(), "{:?}", nan.failures);
    assert!(nan.value.weight.is_nan());
    assert_eq!(nan.value.scale, f32::NEG_INFINITY);
    assert_eq!(factory.load("up").unwrap().unwrap().weight, f64::INFINITY);
    assert_eq!(factory.load("ok").unwrap().unwrap().weight, 2.5);

    let mut failures = Vec::new();
    assert_eq!(factory.load_all(&mut failures).unwrap().len(), 3);
    assert!(failures.is_empty());
}
