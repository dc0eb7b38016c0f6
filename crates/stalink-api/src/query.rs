// ── Collection queries ──
//
// `Query<T>` accumulates OData-style options and runs a GET on the DAO's
// collection path. Options are validated against the entity graph before
// the URL is built.

use std::marker::PhantomData;

use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::Error;
use crate::model::Entity;
use crate::path::{EntityRef, Expand, Expansion};
use crate::service::SensorThingsService;

const APPLICATION_JSON: &str = "application/json";

/// Query over a collection of `T`. Builder methods return a new query.
pub struct Query<T: Entity> {
    service: SensorThingsService,
    parent: Option<EntityRef>,
    filter: Option<String>,
    expand: Expansion,
    select: Vec<String>,
    order_by: Vec<String>,
    top: Option<u32>,
    skip: Option<u32>,
    count: bool,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            parent: self.parent.clone(),
            filter: self.filter.clone(),
            expand: self.expand.clone(),
            select: self.select.clone(),
            order_by: self.order_by.clone(),
            top: self.top,
            skip: self.skip,
            count: self.count,
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> std::fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("entity_type", &T::TYPE)
            .field("parent", &self.parent)
            .field("options", &self.options())
            .finish()
    }
}

impl<T: Entity> Query<T> {
    pub(crate) fn new(service: SensorThingsService, parent: Option<EntityRef>) -> Self {
        Self {
            service,
            parent,
            filter: None,
            expand: Expansion::new(),
            select: Vec::new(),
            order_by: Vec::new(),
            top: None,
            skip: None,
            count: false,
            _entity: PhantomData,
        }
    }

    /// `$filter`, in OData syntax (e.g. `result gt 20`).
    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Add one `$expand` item.
    #[must_use]
    pub fn expand(mut self, item: Expand) -> Self {
        self.expand = self.expand.with(item);
        self
    }

    /// Replace the whole `$expand` value.
    #[must_use]
    pub fn expansion(mut self, expansion: Expansion) -> Self {
        self.expand = expansion;
        self
    }

    #[must_use]
    pub fn select<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(properties.into_iter().map(Into::into));
        self
    }

    /// `$orderby` clause such as `phenomenonTime desc`; repeatable.
    #[must_use]
    pub fn order_by(mut self, order: impl Into<String>) -> Self {
        self.order_by.push(order.into());
        self
    }

    #[must_use]
    pub fn top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }

    #[must_use]
    pub fn skip(mut self, skip: u32) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Ask the server for `@iot.count`.
    #[must_use]
    pub fn count(mut self) -> Self {
        self.count = true;
        self
    }

    fn options(&self) -> Vec<(&'static str, String)> {
        let mut options = Vec::new();
        if let Some(filter) = &self.filter {
            options.push(("$filter", filter.clone()));
        }
        if !self.expand.is_empty() {
            options.push(("$expand", self.expand.to_string()));
        }
        if !self.select.is_empty() {
            options.push(("$select", self.select.join(",")));
        }
        if !self.order_by.is_empty() {
            options.push(("$orderby", self.order_by.join(",")));
        }
        if let Some(top) = self.top {
            options.push(("$top", top.to_string()));
        }
        if let Some(skip) = self.skip {
            options.push(("$skip", skip.to_string()));
        }
        if self.count {
            options.push(("$count", "true".to_owned()));
        }
        options
    }

    /// Validate the options and build the request URL.
    pub fn url(&self) -> Result<Url, Error> {
        let graph = self.service.graph();
        graph.validate_select(T::TYPE, self.select.as_slice())?;
        self.expand.validate(graph, T::TYPE)?;

        let path = graph.collection_path(self.parent.as_ref(), T::TYPE)?;
        let mut url = self.service.url(&path)?;
        let options = self.options();
        if !options.is_empty() {
            url.query_pairs_mut().extend_pairs(options);
        }
        Ok(url)
    }

    /// Fetch the first page.
    pub async fn list(&self) -> Result<EntityList<T>, Error> {
        let url = self.url()?;
        EntityList::fetch(&self.service, url).await
    }

    /// Fetch every page, following `@iot.nextLink`.
    pub async fn list_all(&self) -> Result<Vec<T>, Error> {
        let mut page = self.list().await?;
        let mut all = Vec::new();
        loop {
            let next = page.next_page().await?;
            all.append(&mut page.entities);
            match next {
                Some(next) => page = next,
                None => break,
            }
        }
        Ok(all)
    }

    /// The first matching entity, if any.
    pub async fn first(&self) -> Result<Option<T>, Error> {
        let page = self.clone().top(1).list().await?;
        Ok(page.entities.into_iter().next())
    }
}

// ── Result pages ─────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    value: Vec<Value>,
    #[serde(rename = "@iot.count", default)]
    count: Option<i64>,
    #[serde(rename = "@iot.nextLink", default)]
    next_link: Option<String>,
}

/// One page of a collection response.
pub struct EntityList<T: Entity> {
    entities: Vec<T>,
    count: Option<i64>,
    next_link: Option<Url>,
    service: SensorThingsService,
}

impl<T: Entity> std::fmt::Debug for EntityList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityList")
            .field("entities", &self.entities)
            .field("count", &self.count)
            .field("next_link", &self.next_link.as_ref().map(Url::as_str))
            .finish()
    }
}

impl<T: Entity> EntityList<T> {
    async fn fetch(service: &SensorThingsService, url: Url) -> Result<Self, Error> {
        let request = service.http().get(url).header(ACCEPT, APPLICATION_JSON);
        let response = service.execute(request).await?;
        let page: ListResponse = SensorThingsService::read_json(response).await?;

        let entities = page
            .value
            .iter()
            .map(|item| service.decode_entity(item))
            .collect::<Result<Vec<T>, _>>()?;
        let next_link = page
            .next_link
            .map(|link| service.endpoint().join(&link))
            .transpose()?;

        Ok(Self {
            entities,
            count: page.count,
            next_link,
            service: service.clone(),
        })
    }

    pub fn entities(&self) -> &[T] {
        &self.entities
    }

    pub fn into_entities(self) -> Vec<T> {
        self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Total collection size, when requested with [`Query::count`].
    pub fn count(&self) -> Option<i64> {
        self.count
    }

    pub fn next_link(&self) -> Option<&Url> {
        self.next_link.as_ref()
    }

    pub fn has_next(&self) -> bool {
        self.next_link.is_some()
    }

    /// Fetch the page behind `@iot.nextLink`, if there is one.
    pub async fn next_page(&self) -> Result<Option<Self>, Error> {
        match &self.next_link {
            Some(url) => Self::fetch(&self.service, url.clone()).await.map(Some),
            None => Ok(None),
        }
    }
}

impl<T: Entity> IntoIterator for EntityList<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.into_iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{Datastream, EntityType, Id, Observation, Thing};

    fn service() -> SensorThingsService {
        SensorThingsService::new("http://example.org/v1.1").unwrap()
    }

    #[test]
    fn builds_url_with_all_options() {
        let query = service()
            .observations()
            .query()
            .filter("result gt 20")
            .select(["result", "phenomenonTime"])
            .order_by("phenomenonTime desc")
            .top(10)
            .skip(5)
            .count();
        let url = query.url().unwrap();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(url.path(), "/v1.1/Observations");
        assert_eq!(
            pairs,
            [
                ("$filter".to_owned(), "result gt 20".to_owned()),
                ("$select".to_owned(), "result,phenomenonTime".to_owned()),
                ("$orderby".to_owned(), "phenomenonTime desc".to_owned()),
                ("$top".to_owned(), "10".to_owned()),
                ("$skip".to_owned(), "5".to_owned()),
                ("$count".to_owned(), "true".to_owned()),
            ]
        );
    }

    #[test]
    fn builder_methods_leave_original_untouched() {
        let base = service().things().query();
        let filtered = base.clone().filter("name eq 'x'");
        assert!(base.url().unwrap().query().is_none());
        assert!(filtered.url().unwrap().query().is_some());
    }

    #[test]
    fn scoped_query_uses_parent_path() {
        let dao = service()
            .dao::<Datastream>()
            .with_parent_ref(EntityRef::new(EntityType::Thing, Id::Long(1)));
        assert_eq!(dao.query().url().unwrap().path(), "/v1.1/Things(1)/Datastreams");
    }

    #[test]
    fn invalid_options_fail_before_url_is_built() {
        let err = service().things().query().select(["colour"]).url().unwrap_err();
        assert!(matches!(err, Error::UnknownProperty { .. }));

        let err = service()
            .dao::<Observation>()
            .query()
            .expand(Expand::new("Things"))
            .url()
            .unwrap_err();
        assert!(matches!(err, Error::UnknownRelation(_)));

        let dao = service()
            .dao::<Thing>()
            .with_parent_ref(EntityRef::new(EntityType::Observation, Id::Long(1)));
        assert!(matches!(dao.query().url(), Err(Error::NotRelated { .. })));
    }
}
