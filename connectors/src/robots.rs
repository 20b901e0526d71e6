use crate::http::send_checked;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Rules of the `User-agent: *` group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Robots {
    pub allows: Vec<String>,
    pub disallows: Vec<String>,
    pub crawl_delay: Option<Duration>,
}

impl Robots {
    pub fn parse(txt: &str) -> Self {
        let mut active = false;
        let mut robots = Robots::default();
        for line in txt.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim().to_ascii_lowercase().as_str() {
                "user-agent" => active = value == "*",
                "allow" if active && !value.is_empty() => robots.allows.push(value.to_string()),
                "disallow" if active && !value.is_empty() => robots.disallows.push(value.to_string()),
                "crawl-delay" if active => {
                    if let Ok(seconds) = value.parse::<f64>() {
                        if seconds.is_finite() && seconds >= 0.0 {
                            robots.crawl_delay = Some(Duration::from_secs_f64(seconds));
                        }
                    }
                }
                _ => {}
            }
        }
        robots
    }

    /// The longest matching rule wins; an `Allow` wins a tie.
    pub fn allows(&self, path: &str) -> bool {
        let longest = |rules: &[String]| {
            rules.iter().filter(|rule| path.starts_with(rule.as_str())).map(String::len).max()
        };
        match (longest(&self.allows), longest(&self.disallows)) {
            (Some(allow), Some(disallow)) => allow >= disallow,
            (_, None) => true,
            (None, Some(_)) => false,
        }
    }

    /// Rules for the host of `url`. A missing or unreadable robots.txt allows everything.
    pub async fn fetch(client: &Client, url: &Url) -> Self {
        let Ok(robots_url) = url.join("/robots.txt") else {
            return Robots::default();
        };
        match send_checked(client.get(robots_url)).await {
            Ok(response) => Robots::parse(&response.text().await.unwrap_or_default()),
            Err(error) => {
                tracing::debug!(%error, host = url.host_str().unwrap_or_default(), "no robots.txt");
                Robots::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROBOTS: &str = "
User-agent: googlebot
Disallow: /

User-agent: *
Disallow: /private
Allow: /private/press   # public releases
Disallow:
Crawl-delay: 2.5
";

    #[test]
    fn only_the_wildcard_group_applies() {
        let robots = Robots::parse(ROBOTS);
        assert_eq!(robots.disallows, vec!["/private".to_string()]);
        assert_eq!(robots.allows, vec!["/private/press".to_string()]);
        assert_eq!(robots.crawl_delay, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn longest_match_wins() {
        let robots = Robots::parse(ROBOTS);
        assert!(robots.allows("/about"));
        assert!(!robots.allows("/private/notes"));
        assert!(robots.allows("/private/press/2024"));
    }

    #[test]
    fn empty_rules_allow_everything() {
        assert!(Robots::default().allows("/anything"));
    }
}
