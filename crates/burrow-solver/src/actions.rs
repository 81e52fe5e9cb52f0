use crate::SolverError;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Known package archive suffixes. Anything else on a LINK/FETCH record is a
/// hard error, never silently tolerated.
const ARCHIVE_SUFFIXES: &[&str] = &[".conda", ".tar.bz2"];

/// Canonical distribution name from a package archive file name: the name
/// with its archive suffix stripped. Different backends report the suffix
/// inconsistently, so correlation always happens on the stripped form.
pub fn dist_name_from_file(file_name: &str) -> Result<String, SolverError> {
    for suffix in ARCHIVE_SUFFIXES {
        if let Some(stripped) = file_name.strip_suffix(suffix) {
            return Ok(stripped.to_owned());
        }
    }
    Err(SolverError::UnexpectedArchive(file_name.to_owned()))
}

/// A package the solver would download: concrete URL plus content checksum.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FetchAction {
    #[serde(rename = "fn")]
    pub file_name: String,
    pub url: String,
    #[serde(default)]
    pub md5: String,
}

/// A package the solver would place into the environment, normalized from
/// either backend's field layout into one shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkAction {
    pub dist_name: String,
    pub channel: String,
    pub subdir: String,
    /// Fetch URL without archive suffix.
    pub url_base: String,
    /// `url_base` with the legacy `.tar.bz2` suffix.
    pub url: String,
    /// `url_base` with the `.conda` suffix.
    pub url_conda: String,
}

/// Raw LINK record as emitted by the solver. The classic backend reports
/// base-URL components (`base_url`/`platform`/`dist_name`); the micromamba
/// backend reports a full `url` plus `fn`/`subdir`/`channel`. The shapes are
/// normalized here, immediately after the solver call, so nothing downstream
/// branches on backend identity.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawLinkAction {
    Classic {
        base_url: String,
        platform: String,
        dist_name: String,
        #[serde(default)]
        channel: String,
    },
    Micromamba {
        url: String,
        #[serde(rename = "fn")]
        file_name: String,
        subdir: String,
        #[serde(default)]
        channel: String,
    },
}

impl RawLinkAction {
    fn normalize(self) -> Result<LinkAction, SolverError> {
        let (dist_name, channel, subdir, url_base) = match self {
            RawLinkAction::Classic {
                base_url,
                platform,
                dist_name,
                channel,
            } => {
                let url_base = format!("{base_url}/{platform}/{dist_name}");
                (dist_name, channel, platform, url_base)
            }
            RawLinkAction::Micromamba {
                url,
                file_name,
                subdir,
                channel,
            } => {
                let url_base = dist_name_from_file(&url)?;
                let dist_name = dist_name_from_file(&file_name)?;
                (dist_name, channel_name_from_url(&channel), subdir, url_base)
            }
        };
        Ok(LinkAction {
            dist_name,
            channel,
            subdir,
            url: format!("{url_base}.tar.bz2"),
            url_conda: format!("{url_base}.conda"),
            url_base,
        })
    }
}

/// The micromamba backend reports the channel as a full subdir URL
/// (`https://host/<channel>/<subdir>`); reduce it to the bare channel name.
fn channel_name_from_url(channel: &str) -> String {
    let path = channel
        .split_once("://")
        .map_or(channel, |(_, rest)| rest.split_once('/').map_or("", |(_, p)| p));
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() >= 2 {
        segments[segments.len() - 2].to_owned()
    } else {
        channel.to_owned()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawActions {
    #[serde(rename = "FETCH", default)]
    fetch: Vec<FetchAction>,
    #[serde(rename = "LINK", default)]
    link: Vec<RawLinkAction>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawDryRun {
    actions: RawActions,
}

/// Parsed and normalized result of a dry-run install query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRunResult {
    pub fetch: Vec<FetchAction>,
    /// LINK order is preserved; manifest output ordering follows it.
    pub link: Vec<LinkAction>,
}

impl DryRunResult {
    /// Normalize a successful solver JSON document.
    pub fn from_value(value: serde_json::Value) -> Result<Self, SolverError> {
        let raw: RawDryRun = serde_json::from_value(value)
            .map_err(|e| SolverError::Failed(format!("unrecognized dry-run layout: {e}")))?;
        let link = raw
            .actions
            .link
            .into_iter()
            .map(RawLinkAction::normalize)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            fetch: raw.actions.fetch,
            link,
        })
    }

    /// FETCH actions indexed by normalized distribution name. Explicit key
    /// lookup only; iteration over this map is deterministic.
    pub fn fetch_index(&self) -> Result<BTreeMap<String, &FetchAction>, SolverError> {
        let mut index = BTreeMap::new();
        for action in &self.fetch {
            index.insert(dist_name_from_file(&action.file_name)?, action);
        }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dist_name_strips_both_suffixes_to_same_form() {
        assert_eq!(
            dist_name_from_file("foo-1.0-0.tar.bz2").unwrap(),
            "foo-1.0-0"
        );
        assert_eq!(dist_name_from_file("foo-1.0-0.conda").unwrap(), "foo-1.0-0");
    }

    #[test]
    fn unknown_suffix_is_a_hard_error() {
        let err = dist_name_from_file("foo-1.0-0.zip").unwrap_err();
        assert!(matches!(err, SolverError::UnexpectedArchive(f) if f == "foo-1.0-0.zip"));
    }

    #[test]
    fn classic_link_layout_normalized() {
        let value = serde_json::json!({
            "actions": {
                "FETCH": [],
                "LINK": [{
                    "base_url": "https://conda.anaconda.org/conda-forge",
                    "platform": "linux-64",
                    "dist_name": "numpy-1.26.4-py311h64a7726_0",
                    "channel": "conda-forge",
                    "name": "numpy",
                    "version": "1.26.4"
                }]
            }
        });
        let result = DryRunResult::from_value(value).unwrap();
        let link = &result.link[0];
        assert_eq!(link.dist_name, "numpy-1.26.4-py311h64a7726_0");
        assert_eq!(
            link.url,
            "https://conda.anaconda.org/conda-forge/linux-64/numpy-1.26.4-py311h64a7726_0.tar.bz2"
        );
        assert_eq!(
            link.url_conda,
            "https://conda.anaconda.org/conda-forge/linux-64/numpy-1.26.4-py311h64a7726_0.conda"
        );
        assert_eq!(link.subdir, "linux-64");
    }

    #[test]
    fn micromamba_link_layout_normalized_to_same_shape() {
        let value = serde_json::json!({
            "actions": {
                "FETCH": [],
                "LINK": [{
                    "url": "https://conda.anaconda.org/conda-forge/linux-64/numpy-1.26.4-py311h64a7726_0.conda",
                    "fn": "numpy-1.26.4-py311h64a7726_0.conda",
                    "subdir": "linux-64",
                    "channel": "https://conda.anaconda.org/conda-forge/linux-64"
                }]
            }
        });
        let result = DryRunResult::from_value(value).unwrap();
        let link = &result.link[0];
        assert_eq!(link.dist_name, "numpy-1.26.4-py311h64a7726_0");
        assert_eq!(link.channel, "conda-forge");
        assert_eq!(
            link.url,
            "https://conda.anaconda.org/conda-forge/linux-64/numpy-1.26.4-py311h64a7726_0.tar.bz2"
        );
        assert_eq!(link.subdir, "linux-64");
    }

    #[test]
    fn fetch_index_keys_are_suffix_stripped() {
        let value = serde_json::json!({
            "actions": {
                "FETCH": [
                    {"fn": "a-1.0-0.conda", "url": "https://c/a-1.0-0.conda", "md5": "aaaa"},
                    {"fn": "b-2.0-0.tar.bz2", "url": "https://c/b-2.0-0.tar.bz2", "md5": "bbbb"}
                ],
                "LINK": []
            }
        });
        let result = DryRunResult::from_value(value).unwrap();
        let index = result.fetch_index().unwrap();
        assert_eq!(index["a-1.0-0"].md5, "aaaa");
        assert_eq!(index["b-2.0-0"].md5, "bbbb");
    }

    #[test]
    fn missing_action_lists_default_to_empty() {
        let value = serde_json::json!({"actions": {}});
        let result = DryRunResult::from_value(value).unwrap();
        assert!(result.fetch.is_empty());
        assert!(result.link.is_empty());
    }
}
