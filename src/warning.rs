use std::fmt;

/// Non-fatal conditions reported to the user while a command carries on.
#[derive(Debug, Clone, PartialEq)]
pub enum CiWarning {
    /// Tags that are not version strings were ignored
    SkippedTags { tags: Vec<String> },
    /// The GitHub CLI cannot be used, the REST API is used instead
    GhUnavailable { reason: String },
    /// The AWS CLI is missing, docs are uploaded with the fallback uploader
    AwsCliUnavailable { fallback: String },
    /// Docs are only uploaded for push-like events outside PRs
    UploadSkipped { event: Option<String> },
    /// Built docs are only rearranged on push events
    DocsMoveSkipped { event: Option<String> },
    /// Nothing was committed since the latest version tag
    NoNewCommits { latest_tag: String },
}

fn event_name(event: &Option<String>) -> &str {
    event.as_deref().unwrap_or("<unset>")
}

impl fmt::Display for CiWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CiWarning::SkippedTags { tags } => {
                write!(f, "Ignoring {} non-version tag(s): {}", tags.len(), tags.join(", "))
            }
            CiWarning::GhUnavailable { reason } => {
                write!(
                    f,
                    "GitHub CLI not usable ({}), falling back to the REST API",
                    reason
                )
            }
            CiWarning::AwsCliUnavailable { fallback } => {
                write!(f, "AWS CLI not found, uploading with `{}`", fallback)
            }
            CiWarning::UploadSkipped { event } => write!(
                f,
                "Only upload docs artifact for push event (event: {})",
                event_name(event)
            ),
            CiWarning::DocsMoveSkipped { event } => write!(
                f,
                "Built docs are only moved on push events (event: {})",
                event_name(event)
            ),
            CiWarning::NoNewCommits { latest_tag } => {
                write!(f, "No new commits since tag '{}'", latest_tag)
            }
        }
    }
}
