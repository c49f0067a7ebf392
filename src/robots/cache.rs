// Copyright 2024 Felix Engl
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::robots::{CachedRobots, RobotsError};
use std::num::NonZeroUsize;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use url::Url;

/// The key of a cache entry: the origin of the url and the agent.
type RobotsKey = (String, String);

/// A bounded, threadsafe cache for robots.txt entries, one per origin and agent.
///
/// The cache never downloads anything, entries are provided by the caller.
#[derive(Debug, Clone)]
pub struct RobotsCache {
    cache: moka::sync::Cache<RobotsKey, Arc<CachedRobots>>,
    max_age: Option<Duration>,
}

impl RobotsCache {
    pub fn new(cache_size: NonZeroUsize, max_age: Option<Duration>) -> Self {
        Self {
            cache: moka::sync::Cache::new(cache_size.get() as u64),
            max_age,
        }
    }

    pub fn max_age(&self) -> Option<&Duration> {
        self.max_age.as_ref()
    }

    fn key(agent: &str, url: &str) -> Result<RobotsKey, RobotsError> {
        let origin = Url::parse(url)?.origin();
        if !origin.is_tuple() {
            return Err(RobotsError::NoOriginForUrl(url.to_string()));
        }
        Ok((origin.ascii_serialization(), agent.to_string()))
    }

    /// Returns the cached entry for the origin of `url`.
    /// Entries older than `max_age` are evicted and reported as missing.
    pub fn get(
        &self,
        agent: &str,
        url: &str,
        max_age: Option<&Duration>,
    ) -> Result<Option<Arc<CachedRobots>>, RobotsError> {
        let key = Self::key(agent, url)?;
        let Some(found) = self.cache.get(&key) else {
            return Ok(None);
        };
        log::trace!("Robots-Cache-Hit: {:?}", key);
        if let Some(max_age) = max_age {
            if found.is_older_than_at(max_age, OffsetDateTime::now_utc()) {
                log::debug!("Robots-Cache-Expired: {:?}", key);
                self.cache.invalidate(&key);
                return Ok(None);
            }
        }
        Ok(Some(found))
    }

    /// Caches the entry for the origin of `url`, unless a newer one is already cached.
    /// Returns the entry that is cached afterwards.
    pub fn insert(
        &self,
        agent: &str,
        url: &str,
        retrieved: CachedRobots,
    ) -> Result<Arc<CachedRobots>, RobotsError> {
        let key = Self::key(agent, url)?;
        if let Some(associated) = self.cache.get(&key) {
            if retrieved.retrieved_at() < associated.retrieved_at() {
                return Ok(associated);
            }
        }
        let new = Arc::new(retrieved);
        self.cache.insert(key, new.clone());
        Ok(new)
    }

    /// Removes the entry for the origin of `url`.
    pub fn invalidate(&self, agent: &str, url: &str) -> Result<(), RobotsError> {
        self.cache.invalidate(&Self::key(agent, url)?);
        Ok(())
    }

    /// Checks the cache only, returns None if there is no usable entry or the url is invalid.
    pub fn check_if_allowed_fast(&self, agent: &str, url: &str) -> Option<bool> {
        match self.get(agent, url, self.max_age.as_ref()) {
            Ok(found) => found.map(|found| found.allowed(url)),
            Err(err) => {
                log::trace!("Failed robots check for {url}: {err}");
                None
            }
        }
    }

    /// The crawl delay for the origin of `url`, if a cached entry configures one.
    pub fn delay(&self, agent: &str, url: &str) -> Option<Duration> {
        self.get(agent, url, self.max_age.as_ref())
            .ok()
            .flatten()
            .and_then(|found| found.delay())
    }
}

#[cfg(test)]
mod test {
    use crate::robots::{CachedRobots, RobotsCache, RobotsError, TextingRobotsParser};
    use std::num::NonZeroUsize;
    use time::{Duration, OffsetDateTime};

    const ROBOTS: &[u8] = b"User-agent: *\nDisallow: /private\nCrawl-delay: 1\n";

    fn cache() -> RobotsCache {
        RobotsCache::new(NonZeroUsize::new(16).unwrap(), Some(Duration::hours(1)))
    }

    fn retrieved(status: u16, retrieved_at: OffsetDateTime) -> CachedRobots {
        CachedRobots::from_response(&TextingRobotsParser, "erigone", status, ROBOTS, retrieved_at)
    }

    #[test]
    fn entries_are_shared_per_origin() {
        let cache = cache();
        assert_eq!(None, cache.check_if_allowed_fast("erigone", "https://example.com/private"));
        cache
            .insert("erigone", "https://example.com/robots.txt", retrieved(200, OffsetDateTime::now_utc()))
            .unwrap();
        assert_eq!(Some(false), cache.check_if_allowed_fast("erigone", "https://example.com/private/a"));
        assert_eq!(Some(true), cache.check_if_allowed_fast("erigone", "https://example.com/a"));
        assert_eq!(Some(Duration::seconds(1)), cache.delay("erigone", "https://example.com/a"));
        assert_eq!(None, cache.check_if_allowed_fast("erigone", "http://example.com/private"));
        assert_eq!(None, cache.check_if_allowed_fast("otherbot", "https://example.com/private"));

        cache.invalidate("erigone", "https://example.com/").unwrap();
        assert_eq!(None, cache.check_if_allowed_fast("erigone", "https://example.com/private"));
    }

    #[test]
    fn stale_entries_are_dropped() {
        let cache = cache();
        let url = "https://example.com/private";
        let old = OffsetDateTime::now_utc() - Duration::hours(2);
        cache.insert("erigone", url, retrieved(200, old)).unwrap();
        assert!(cache.get("erigone", url, None).unwrap().is_some());
        assert!(cache.get("erigone", url, Some(&Duration::hours(1))).unwrap().is_none());
        assert!(cache.get("erigone", url, None).unwrap().is_none());
    }

    #[test]
    fn newer_entries_win() {
        let cache = cache();
        let url = "https://example.com/private";
        let now = OffsetDateTime::now_utc();
        cache.insert("erigone", url, retrieved(200, now)).unwrap();
        let kept = cache
            .insert("erigone", url, retrieved(404, now - Duration::minutes(5)))
            .unwrap();
        assert!(matches!(*kept, CachedRobots::HasRobots { .. }));
        assert_eq!(Some(false), cache.check_if_allowed_fast("erigone", url));
    }

    #[test]
    fn urls_without_origin_fail() {
        let cache = cache();
        assert!(matches!(
            cache.get("erigone", "data:text/plain,hello", None),
            Err(RobotsError::NoOriginForUrl(_))
        ));
        assert!(matches!(
            cache.get("erigone", "not a url", None),
            Err(RobotsError::InvalidUrl(_))
        ));
        assert_eq!(None, cache.check_if_allowed_fast("erigone", "not a url"));
    }
}
