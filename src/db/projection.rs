//! Field projection
//!
//! Maps the logical field names requested by a client (dot-path strings such
//! as `"address.city"`) onto SQL column expressions and the joins they need.
//! The mapping is a fixed allow-list: anything not in the table is dropped
//! before it can reach SQL.

use std::collections::BTreeSet;

/// Relations reachable from the listings table.
///
/// Declaration order is join-dependency order: cities join through addresses,
/// countries through cities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JoinRelation {
    Address,
    City,
    Country,
}

impl JoinRelation {
    pub fn clause(self) -> &'static str {
        match self {
            JoinRelation::Address => "LEFT JOIN addresses a ON a.id = l.address_id",
            JoinRelation::City => "LEFT JOIN cities c ON c.id = a.city_id",
            JoinRelation::Country => "LEFT JOIN countries co ON co.id = c.country_id",
        }
    }
}

struct FieldDef {
    logical: &'static str,
    expr: &'static str,
    joins: &'static [JoinRelation],
}

/// Every projectable logical field and the SQL it expands to.
///
/// One-to-many relations (images, reviews, bookings) are intentionally
/// absent: they resolve through batch loaders, never inline joins.
const FIELD_TABLE: &[FieldDef] = &[
    FieldDef { logical: "id", expr: "l.id", joins: &[] },
    FieldDef { logical: "title", expr: "l.title", joins: &[] },
    FieldDef { logical: "description", expr: "l.description", joins: &[] },
    FieldDef { logical: "category", expr: "l.category", joins: &[] },
    FieldDef { logical: "pricePerNight", expr: "l.price_per_night", joins: &[] },
    FieldDef { logical: "rating", expr: "l.rating", joins: &[] },
    FieldDef { logical: "amenities", expr: "to_jsonb(l.amenities)", joins: &[] },
    FieldDef { logical: "status", expr: "l.status", joins: &[] },
    FieldDef { logical: "hostId", expr: "l.host_id", joins: &[] },
    FieldDef {
        logical: "address.street",
        expr: "a.street",
        joins: &[JoinRelation::Address],
    },
    FieldDef {
        logical: "address.postalCode",
        expr: "a.postal_code",
        joins: &[JoinRelation::Address],
    },
    FieldDef {
        logical: "address.city",
        expr: "c.name",
        joins: &[JoinRelation::Address, JoinRelation::City],
    },
    FieldDef {
        logical: "address.country",
        expr: "co.name",
        joins: &[JoinRelation::Address, JoinRelation::City, JoinRelation::Country],
    },
];

/// Fallback when the caller requests nothing recognizable.
const DEFAULT_FIELDS: &[&str] = &["id", "title", "pricePerNight"];

/// A single resolved projection entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectedField {
    pub logical: &'static str,
    pub expr: &'static str,
}

/// Resolved projection: ordered fields plus the deduplicated join set.
#[derive(Debug, Clone)]
pub struct ProjectionSpec {
    fields: Vec<ProjectedField>,
    joins: BTreeSet<JoinRelation>,
}

impl ProjectionSpec {
    pub fn fields(&self) -> &[ProjectedField] {
        &self.fields
    }

    /// Join clauses in dependency order, each relation at most once.
    pub fn joins(&self) -> impl Iterator<Item = JoinRelation> + '_ {
        self.joins.iter().copied()
    }

    /// Logical field names in projection order (used for cache keys).
    pub fn logical_fields(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.logical).collect()
    }

    /// Build the single-column select expression for one row per listing.
    ///
    /// Scalars become top-level keys; each one-to-one relation's fields are
    /// wrapped in exactly one nested `jsonb_build_object`, keyed by the
    /// relation name, so joined rows never fan out.
    pub fn select_expr(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        let mut emitted_relations: Vec<&str> = Vec::new();

        for field in &self.fields {
            match field.logical.split_once('.') {
                None => {
                    parts.push(format!("'{}', {}", field.logical, field.expr));
                }
                Some((relation, _)) => {
                    if emitted_relations.contains(&relation) {
                        continue;
                    }
                    emitted_relations.push(relation);

                    let nested: Vec<String> = self
                        .fields
                        .iter()
                        .filter_map(|f| {
                            let (rel, key) = f.logical.split_once('.')?;
                            (rel == relation).then(|| format!("'{}', {}", key, f.expr))
                        })
                        .collect();
                    parts.push(format!(
                        "'{}', jsonb_build_object({})",
                        relation,
                        nested.join(", ")
                    ));
                }
            }
        }

        format!("jsonb_build_object({})", parts.join(", "))
    }
}

/// Resolve requested logical fields against the allow-list.
///
/// Unknown fields are silently ignored. An empty or fully-unknown request
/// falls back to the default minimal set. `id` is always present: pages need
/// it for cursors and nested resolvers key off it.
pub fn project<S: AsRef<str>>(requested: &[S]) -> ProjectionSpec {
    fn add(name: &str, fields: &mut Vec<ProjectedField>, joins: &mut BTreeSet<JoinRelation>) {
        let Some(def) = FIELD_TABLE.iter().find(|d| d.logical == name) else {
            return;
        };
        if fields.iter().any(|f| f.logical == def.logical) {
            return;
        }
        fields.push(ProjectedField {
            logical: def.logical,
            expr: def.expr,
        });
        joins.extend(def.joins.iter().copied());
    }

    let mut fields: Vec<ProjectedField> = Vec::new();
    let mut joins: BTreeSet<JoinRelation> = BTreeSet::new();

    for name in requested {
        add(name.as_ref(), &mut fields, &mut joins);
    }

    if fields.is_empty() {
        for name in DEFAULT_FIELDS {
            add(name, &mut fields, &mut joins);
        }
    }

    if !fields.iter().any(|f| f.logical == "id") {
        fields.insert(
            0,
            ProjectedField {
                logical: "id",
                expr: "l.id",
            },
        );
    }

    ProjectionSpec { fields, joins }
}
