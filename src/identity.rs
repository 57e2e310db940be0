//! Workflow and run identities.

use chrono::Utc;

/// Declares a string newtype with the conversions every identifier needs.
macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Creates a new ", stringify!($name), ".")]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

pub(crate) use string_newtype;

string_newtype!(
    /// Names a workflow type, e.g. `TextToSpeechWorkflow`.
    ///
    /// ```
    /// use speechflow::WorkflowId;
    ///
    /// let id: WorkflowId = "TextToSpeechWorkflow".into();
    /// assert_eq!(id.as_str(), "TextToSpeechWorkflow");
    /// ```
    WorkflowId
);

string_newtype!(
    /// Identifies one execution of a workflow.
    ///
    /// Either chosen by the caller or generated at schedule time with
    /// [`RunId::generate`].
    RunId
);

impl RunId {
    /// Generates a timestamp-derived run identity.
    ///
    /// The format is `{unix_millis}-{sequence}-{workflow}`. The sequence is
    /// supplied by the registry so runs registered within the same
    /// millisecond still differ.
    pub fn generate(workflow_id: &WorkflowId, sequence: u64) -> Self {
        Self(format!(
            "{}-{}-{}",
            Utc::now().timestamp_millis(),
            sequence,
            workflow_id
        ))
    }
}
