use anyhow::bail;
use itertools::Itertools;
use log::trace;
use scraper::{ElementRef, Html};
use url::Url;

use crate::record::{RatingParseError, Record};

/// Location of the review listing for one language, e.g. `tamil`.
pub fn listing_url(base_url: &Url, source: &str) -> Result<Url, url::ParseError> {
    base_url.join(&format!("{source}/movie-reviews/"))
}

/// Fields of one listing entry as found on the page, before validation.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RawEntry {
    pub title: Option<String>,
    pub rating: Option<String>,
    pub link: Option<Url>,
}

impl RawEntry {
    pub fn into_record(self) -> Result<Option<Record>, RatingParseError> {
        Record::parse(self.title.as_deref(), self.rating.as_deref(), self.link)
    }
}

/// Extracts the listing entries of a review page in page order.
///
/// Titles and critic ratings are paired by position, so a page where their
/// counts disagree cannot be read reliably and is rejected.
pub fn parse(html: &Html, page_url: &Url) -> anyhow::Result<Vec<RawEntry>> {
    let titles = html.select(selector!("h2 a")).map(text_of).collect_vec();
    let ratings = html
        .select(selector!(".mrB10 > .ratingMovie"))
        .map(text_of)
        .collect_vec();
    let links = html
        .select(selector!(".mr_listing_right > h2 > a"))
        .map(|a| {
            let href = a.value().attr("href")?;
            page_url
                .join(href)
                .inspect_err(|e| trace!("Ignoring bad href {href:?}: {e}"))
                .ok()
        })
        .collect_vec();

    if titles.len() != ratings.len() {
        bail!(
            "Found {} titles but {} ratings on {page_url}",
            titles.len(),
            ratings.len()
        );
    }

    let mut links = links.into_iter();
    Ok(titles
        .into_iter()
        .zip(ratings)
        .map(|(title, rating)| RawEntry {
            title,
            rating,
            link: links.next().flatten(),
        })
        .collect())
}

fn text_of(element: ElementRef) -> Option<String> {
    let text = element.text().collect::<String>();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_owned())
}
