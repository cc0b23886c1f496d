use serde::Deserialize;

use super::context;

/// One page of an entity collection read
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct EntityCollection<T> {
    #[serde(default)]
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
    #[serde(rename = "@odata.count", default)]
    pub count: Option<u64>,
    #[serde(rename = "@odata.context", default)]
    pub context: Option<String>,
}

impl<T> Default for EntityCollection<T> {
    fn default() -> Self {
        Self {
            value: Vec::new(),
            next_link: None,
            count: None,
            context: None,
        }
    }
}

impl<T> EntityCollection<T> {
    /// Entity set named by `@odata.context`
    pub fn entity_set(&self) -> Option<&str> {
        context::entity_set_name(self.context.as_deref())
    }

    pub fn has_more(&self) -> bool {
        self.next_link.is_some()
    }
}
