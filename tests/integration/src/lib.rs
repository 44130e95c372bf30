//! End-to-end tests of the dynq query surface.
//!
//! The fixture is a small content tree: every node declares `Id`, `Name`,
//! `Template`, `CreateDate` and `Children`, and answers any other name from
//! its loosely typed property bag.
//!
//! Run them with:
//! ```text
//! cargo test -p dynq-integration
//! ```

use std::collections::BTreeMap;
use std::sync::Once;

use chrono::{NaiveDate, NaiveDateTime};
use dynq_core::{Record, RecordType, Type, Value};

static INIT: Once = Once::new();

/// Initialize tracing (once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A node of the content tree.
#[derive(Debug)]
pub struct Content {
    id: i32,
    name: String,
    template: String,
    create_date: NaiveDateTime,
    properties: BTreeMap<String, Value>,
    children: Vec<Value>,
}

impl Record for Content {
    fn type_name(&self) -> &str {
        "Content"
    }

    fn try_get_named_value(&self, name: &str) -> Option<Value> {
        match name {
            "Id" => Some(Value::Int32(self.id)),
            "Name" => Some(Value::from(self.name.as_str())),
            "Template" => Some(Value::from(self.template.as_str())),
            "CreateDate" => Some(Value::DateTime(self.create_date)),
            "Children" => Some(Value::list(self.children.iter().cloned())),
            other => self.properties.get(other).cloned(),
        }
    }

    fn named_values(&self) -> Vec<(String, Value)> {
        ["Id", "Name", "Template", "CreateDate", "Children"]
            .into_iter()
            .filter_map(|n| self.try_get_named_value(n).map(|v| (n.to_owned(), v)))
            .chain(self.properties.iter().map(|(k, v)| (k.clone(), v.clone())))
            .collect()
    }
}

/// Static shape of [`Content`].
#[must_use]
pub fn content_type() -> Type {
    Type::Record(
        RecordType::dynamic("Content")
            .with_field("Id", Type::INT32)
            .with_field("Name", Type::STRING)
            .with_field("Template", Type::STRING)
            .with_field("CreateDate", Type::DATE_TIME)
            .with_field("Children", Type::sequence(Type::dynamic_record("Content")))
            .into(),
    )
}

/// Midnight of the given day.
#[must_use]
pub fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

fn node(
    id: i32,
    name: &str,
    template: &str,
    created: NaiveDateTime,
    properties: serde_json::Value,
    children: Vec<Value>,
) -> Value {
    let properties = match Value::from(properties) {
        Value::Map(map) => map.as_ref().clone(),
        _ => BTreeMap::new(),
    };
    Value::record(Content {
        id,
        name: name.to_owned(),
        template: template.to_owned(),
        create_date: created,
        properties,
        children,
    })
}

/// Every node of the site, in document order:
/// Home, About, Blog, Post 1, Post 2, Post 3, Contact.
///
/// `views` is an integer on most nodes, a string on Post 2 and missing on
/// Blog and Contact.
#[must_use]
pub fn site() -> Vec<Value> {
    init_tracing();

    let about = node(
        2,
        "About",
        "text",
        date(2024, 2, 1),
        serde_json::json!({"views": 15, "author": "ann"}),
        vec![],
    );
    let post1 = node(
        4,
        "Post 1",
        "post",
        date(2024, 4, 1),
        serde_json::json!({"views": 40, "author": "Ann", "tags": ["rust", "query"]}),
        vec![],
    );
    let post2 = node(
        5,
        "Post 2",
        "post",
        date(2024, 5, 1),
        serde_json::json!({"views": "7", "author": "bob"}),
        vec![],
    );
    let post3 = node(
        6,
        "Post 3",
        "post",
        date(2024, 6, 1),
        serde_json::json!({"views": 300}),
        vec![],
    );
    let blog = node(
        3,
        "Blog",
        "list",
        date(2024, 3, 5),
        serde_json::json!({"author": "bob"}),
        vec![post1.clone(), post2.clone(), post3.clone()],
    );
    let contact = node(7, "Contact", "text", date(2024, 7, 1), serde_json::json!({}), vec![]);
    let home = node(
        1,
        "Home",
        "home",
        date(2024, 1, 10),
        serde_json::json!({"views": 120, "featured": true}),
        vec![about.clone(), blog.clone(), contact.clone()],
    );

    vec![home, about, blog, post1, post2, post3, contact]
}

/// The `Name` of every element.
#[must_use]
pub fn names(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.named_value("Name", false).map(|n| n.to_string()).unwrap_or_default())
        .collect()
}

mod test_filter;
mod test_grouping;
mod test_ordering;
mod test_projection;
