use std::fmt;

use indoc::formatdoc;
use libherokubuildpack::log::log_error;
use publish_artifacts::PublishError;

use crate::TOOL_NAME;

const SUBMIT_AN_ISSUE: &str = "\
If the issue persists and you think you found a bug in binary-publish then reproduce the issue \
locally with a minimal example and open an issue in the project's GitHub repository with the details.";

#[derive(Debug)]
pub(crate) enum BinaryPublishError {
    ConfigurationFailed(publish_config::Error),
    PublishFailed(PublishError),
}

impl fmt::Display for BinaryPublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryPublishError::ConfigurationFailed(error) => write!(f, "{error}"),
            BinaryPublishError::PublishFailed(error) => write!(f, "{error}"),
        }
    }
}

impl From<publish_config::Error> for BinaryPublishError {
    fn from(value: publish_config::Error) -> Self {
        BinaryPublishError::ConfigurationFailed(value)
    }
}

impl From<PublishError> for BinaryPublishError {
    fn from(value: PublishError) -> Self {
        BinaryPublishError::PublishFailed(value)
    }
}

pub(crate) fn on_error(error: &BinaryPublishError) {
    match error {
        BinaryPublishError::ConfigurationFailed(error) => log_error(
            format!("{TOOL_NAME} configuration error"),
            formatdoc! {"
                {error}

                Settings are read from the project config file and from \
                BINARY_PUBLISH_* environment variables.
            "},
        ),
        BinaryPublishError::PublishFailed(
            error @ (PublishError::MissingArtifact(_) | PublishError::AlreadyPublished(_)),
        ) => log_error(format!("{TOOL_NAME} failed"), error.to_string()),
        BinaryPublishError::PublishFailed(error) => log_error(
            format!("{TOOL_NAME} failed"),
            formatdoc! {"
                {error}

                Nothing is retried automatically. Check the storage credentials and \
                network access, then run the command again.

                {SUBMIT_AN_ISSUE}
            "},
        ),
    }
}
