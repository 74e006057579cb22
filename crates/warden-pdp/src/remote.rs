//! Attribute filling for resources owned by other systems.
//!
//! Only the fields the policies actually reference are requested.

use warden_abac::{Condition, policy_attr_keys};
use warden_types::{AttrValue, ExtResource, ID_KEY, Instance, Request};

use crate::error::{Result, upstream};
use crate::source::RemoteResourceSource;

/// Replaces the attributes of each remote resource in `request` with the
/// ones fetched from `source`.
pub(crate) fn fill_remote_resource_attrs<'a>(
    request: &mut Request,
    conditions: impl IntoIterator<Item = &'a Condition> + Clone,
    source: &dyn RemoteResourceSource,
) -> Result<()> {
    for resource in request.remote_resources_mut() {
        let keys = policy_attr_keys(&resource.namespace(), conditions.clone());
        resource.attribute = source
            .query_attributes(&resource.system, &resource.kind, &resource.id, &keys)
            .map_err(upstream("fill_remote_resource_attrs"))?;
    }
    Ok(())
}

/// Fetches the instances of `resource` with the attributes `conditions`
/// reference. Instance IDs come from each bag's `id`.
pub(crate) fn query_ext_resource_attrs(
    resource: &ExtResource,
    conditions: &[Condition],
    source: &dyn RemoteResourceSource,
) -> Result<Vec<Instance>> {
    if resource.ids.is_empty() {
        return Ok(Vec::new());
    }

    let namespace = format!("{}.{}", resource.system, resource.kind);
    let keys = policy_attr_keys(&namespace, conditions);
    let bags = source
        .batch_query_attributes(&resource.system, &resource.kind, &resource.ids, &keys)
        .map_err(upstream("query_ext_resource_attrs"))?;

    Ok(bags
        .into_iter()
        .map(|attribute| Instance {
            id: attribute
                .get(ID_KEY)
                .map(AttrValue::to_string)
                .unwrap_or_default(),
            attribute,
        })
        .collect())
}
