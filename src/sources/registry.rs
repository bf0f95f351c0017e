use url::Url;

use crate::errors::{FeedError, FeedResult};
use crate::sources::traits::SiteExtractor;
use crate::sources::{
    comicwalker::ComicWalkerSource, fuz::FuzSource, ganganonline::GanganOnlineSource,
    kakuyomu::KakuyomuSource, meteor::MeteorSource, narou::NarouSource,
    newtype::NewtypeSource, ride::RideSource, takecomi::TakecomiSource,
    takeshobo::TakeshoboSource, valkyrie::ValkyrieSource,
};

/// Ordered prefix table mapping target URLs to their extractor.
pub struct SiteRegistry {
    sites: Vec<(String, Box<dyn SiteExtractor>)>,
}

impl SiteRegistry {
    pub fn new() -> Self {
        let mut registry = Self::empty();

        // First matching prefix wins
        registry.register("https://kirapo.jp/", Box::new(MeteorSource::new()));
        registry.register("https://www.comic-valkyrie.com/", Box::new(ValkyrieSource::new()));
        registry.register("https://ncode.syosetu.com/", Box::new(NarouSource::new()));
        registry.register("https://kakuyomu.jp/works/", Box::new(KakuyomuSource::new()));
        registry.register("https://comic-fuz.com/manga/", Box::new(FuzSource::new()));
        registry.register("https://comic-walker.com/detail/", Box::new(ComicWalkerSource::new()));
        registry.register("https://www.ganganonline.com/title/", Box::new(GanganOnlineSource::new()));
        registry.register("https://takecomic.jp/series/", Box::new(TakecomiSource::new()));
        registry.register("https://gammaplus.takeshobo.co.jp/", Box::new(TakeshoboSource::gammaplus()));
        registry.register("https://storia.takeshobo.co.jp/", Box::new(TakeshoboSource::storia()));
        registry.register("https://comicride.jp/", Box::new(RideSource::new()));
        registry.register("https://comic.webnewtype.com/contents/", Box::new(NewtypeSource::new()));

        registry
    }

    /// A registry with no sites, for callers that build their own table.
    pub fn empty() -> Self {
        Self { sites: Vec::new() }
    }

    pub fn register(&mut self, prefix: impl Into<String>, extractor: Box<dyn SiteExtractor>) {
        self.sites.push((prefix.into(), extractor));
    }

    /// Parse `target` and find the extractor owning it. Parsing comes first, so
    /// a malformed target is always `InvalidUrl` even if no site would match.
    pub fn resolve(&self, target: &str) -> FeedResult<(Url, &dyn SiteExtractor)> {
        let url = Url::parse(target).map_err(|source| FeedError::InvalidUrl {
            url: target.to_string(),
            source,
        })?;

        self.sites
            .iter()
            .find(|(prefix, _)| target.starts_with(prefix.as_str()))
            .map(|(_, extractor)| (url, extractor.as_ref()))
            .ok_or_else(|| FeedError::UnsupportedSite(target.to_string()))
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.sites.iter().map(|(prefix, _)| prefix.as_str())
    }
}

impl Default for SiteRegistry {
    fn default() -> Self {
        Self::new()
    }
}
