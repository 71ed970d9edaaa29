//! Links for sharing tracks.

use url::Url;

use crate::error::Result;

const TRACK_URL: &str = "https://open.spotify.com/track/";
const TWITTER_INTENT_URL: &str = "https://twitter.com/intent/tweet";
const FACEBOOK_SHARER_URL: &str = "https://www.facebook.com/sharer/sharer.php";

/// Links to share one item.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShareLinks {
    /// The item on open.spotify.com, also used for copying.
    pub url: Url,
    pub twitter: Url,
    pub facebook: Url,
}

impl ShareLinks {
    /// Builds links to share `url` under `title`.
    ///
    /// The post text reads "Check out {title}: {description} on Spotify", or
    /// without the description part when there is none.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the sharing endpoints cannot be parsed.
    pub fn new(url: Url, title: &str, description: Option<&str>) -> Result<Self> {
        let text = match description.filter(|description| !description.is_empty()) {
            Some(description) => format!("Check out {title}: {description} on Spotify"),
            None => format!("Check out {title} on Spotify"),
        };

        let twitter = Url::parse_with_params(
            TWITTER_INTENT_URL,
            &[("text", text.as_str()), ("url", url.as_str())],
        )?;
        let facebook = Url::parse_with_params(FACEBOOK_SHARER_URL, &[("u", url.as_str())])?;

        Ok(Self {
            url,
            twitter,
            facebook,
        })
    }

    /// Builds links for a track by its id.
    ///
    /// # Errors
    ///
    /// Will return `Err` if `track_id` does not form a valid URL.
    pub fn track(track_id: &str, title: &str, description: Option<&str>) -> Result<Self> {
        Self::new(track_url(track_id)?, title, description)
    }
}

/// The open.spotify.com page of a track.
///
/// # Errors
///
/// Will return `Err` if `track_id` does not form a valid URL.
pub fn track_url(track_id: &str) -> Result<Url> {
    Ok(Url::parse(TRACK_URL)?.join(track_id)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_links() {
        let links = ShareLinks::track(
            "4uLU6hMCjMI75M1A2tKUQC",
            "Never Gonna Give You Up",
            Some("Rick Astley"),
        )
        .unwrap();

        assert_eq!(
            links.url.as_str(),
            "https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC"
        );

        let text = links
            .twitter
            .query_pairs()
            .find(|(key, _)| key == "text")
            .map(|(_, value)| value.into_owned());
        assert_eq!(
            text.as_deref(),
            Some("Check out Never Gonna Give You Up: Rick Astley on Spotify")
        );
        assert!(links.twitter.as_str().starts_with(TWITTER_INTENT_URL));

        let shared = links
            .facebook
            .query_pairs()
            .find(|(key, _)| key == "u")
            .map(|(_, value)| value.into_owned());
        assert_eq!(shared.as_deref(), Some(links.url.as_str()));
    }

    #[test]
    fn text_without_description() {
        let links = ShareLinks::track("abc", "Song", None).unwrap();
        let text = links
            .twitter
            .query_pairs()
            .find(|(key, _)| key == "text")
            .map(|(_, value)| value.into_owned());
        assert_eq!(text.as_deref(), Some("Check out Song on Spotify"));
    }
}
