/*!
# Dependency Extraction

Enumerates the reactive fields of a view declaration: stored properties carrying one
of the host's reactivity attributes.
*/

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::{Attribute, Property, ToSource, ViewDecl};
use crate::config::Vocabulary;

/// Which reactivity mechanism exposes a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactiveSource {
    /// State owned by the view itself
    State,
    /// State passed in by a parent
    Binding,
    /// An observed external object
    ObservedObject,
    /// A value injected through the environment
    Environment,
}

/// One state-bearing declaration on a view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactiveField {
    pub name: String,
    /// Type as written; only used to pick a trigger mutation
    pub declared_type: String,
    pub source: ReactiveSource,
    /// The attribute as written, e.g. `@State`
    pub annotation: String,
}

/// Extract the reactive fields of a declaration, in declaration order.
///
/// Untyped properties are skipped: they are a coverage gap, not an error.
pub fn extract_dependencies(decl: &ViewDecl, vocabulary: &Vocabulary) -> Vec<ReactiveField> {
    let fields: Vec<ReactiveField> = decl
        .properties()
        .filter(|property| property.is_stored() && !property.is_static)
        .filter_map(|property| reactive_field(property, vocabulary))
        .collect();

    debug!(
        view = %decl.name,
        fields = fields.len(),
        "extracted reactive fields"
    );
    fields
}

fn reactive_field(property: &Property, vocabulary: &Vocabulary) -> Option<ReactiveField> {
    let (attribute, source) = property_wrapper(&property.attributes, vocabulary)?;
    let Some(ty) = &property.ty else {
        debug!(field = %property.name, "skipping reactive field without a type annotation");
        return None;
    };

    Some(ReactiveField {
        name: property.name.clone(),
        declared_type: ty.trim().to_string(),
        source,
        annotation: attribute.to_source(),
    })
}

/// First attribute the vocabulary recognizes as a reactivity wrapper
fn property_wrapper<'a>(
    attributes: &'a [Attribute],
    vocabulary: &Vocabulary,
) -> Option<(&'a Attribute, ReactiveSource)> {
    attributes
        .iter()
        .find_map(|attr| vocabulary.reactive_source(&attr.name).map(|source| (attr, source)))
}
