//! Configuration of the pipelines assembled by the crate-level entry points.
//!
//! [`PipelineOptions`] decides which decorators sit in front of the tree
//! sink. Each delegate chain is composed in a fixed order:
//!
//! ```text
//! identifier filter -> cycle guard -> format override -> inline -> tree sink
//! ```
//!
//! The filter is present only when a consumer is configured, the guard only
//! when a registry policy is set (or the root is seeded), and the inline
//! stage only while inlining is enabled. The format-override stage is always
//! present, so a format marker without a registered codec fails the
//! traversal that reaches it.
//!
//! ## Examples
//!
//! ```rust
//! use sinkchain::{to_element_with_options, Indexing, PipelineOptions, RegistryPolicy};
//!
//! let options = PipelineOptions::new()
//!     .with_cycle_guard(RegistryPolicy::reference().with_indexing(Indexing::Linear))
//!     .with_inline(false);
//! let tree = to_element_with_options(&vec![1i32, 2, 3], options).unwrap();
//! assert_eq!(tree.node_count(), 4);
//! ```

use crate::{FormatRegistry, RegistryPolicy};

/// Configuration options for pipeline assembly.
///
/// # Examples
///
/// ```rust
/// use sinkchain::{FormatRegistry, JsonCodec, PipelineOptions};
///
/// // Default: no guard, no filter, inlining on
/// let options = PipelineOptions::new();
/// assert!(options.inline);
/// assert!(options.cycle_guard.is_none());
///
/// // Guarded traversal for one consumer with a JSON codec
/// let options = PipelineOptions::new()
///     .with_seeded_root(true)
///     .with_formats(FormatRegistry::new().with("json", JsonCodec::text()))
///     .with_consumer("admin");
/// assert!(options.guard_policy().is_some());
/// ```
#[derive(Clone, Debug)]
pub struct PipelineOptions {
    pub cycle_guard: Option<RegistryPolicy>,
    pub seeded_root: bool,
    pub formats: FormatRegistry,
    pub inline: bool,
    pub consumer: Option<String>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            cycle_guard: None,
            seeded_root: false,
            formats: FormatRegistry::new(),
            inline: true,
            consumer: None,
        }
    }
}

impl PipelineOptions {
    /// Creates default options (unguarded, unfiltered, inline markers honored).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a cycle guard with `policy` in every delegate chain.
    ///
    /// Each chain gets its own registry; registries are never shared between
    /// delegates or reused across traversals.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sinkchain::{PipelineOptions, RegistryPolicy};
    ///
    /// let options = PipelineOptions::new().with_cycle_guard(RegistryPolicy::value());
    /// assert_eq!(options.guard_policy(), Some(RegistryPolicy::value()));
    /// ```
    #[must_use]
    pub fn with_cycle_guard(mut self, policy: RegistryPolicy) -> Self {
        self.cycle_guard = Some(policy);
        self
    }

    /// Registers the root value before traversal starts.
    ///
    /// Without seeding the root is driven directly and never registered, so
    /// a back reference to it is written once more before the guard stops
    /// it. Seeding without an explicit policy guards with the default one.
    #[must_use]
    pub fn with_seeded_root(mut self, seeded: bool) -> Self {
        self.seeded_root = seeded;
        self
    }

    /// Sets the codecs available to format-marked fields.
    #[must_use]
    pub fn with_formats(mut self, formats: FormatRegistry) -> Self {
        self.formats = formats;
        self
    }

    /// Enables or disables splicing of inline-marked fields.
    ///
    /// When disabled, inline-marked structures nest like any other field.
    #[must_use]
    pub fn with_inline(mut self, inline: bool) -> Self {
        self.inline = inline;
        self
    }

    /// Filters the traversal for the consumer identifier `id`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sinkchain::PipelineOptions;
    ///
    /// let options = PipelineOptions::new().with_consumer("id2");
    /// assert_eq!(options.consumer.as_deref(), Some("id2"));
    /// ```
    #[must_use]
    pub fn with_consumer(mut self, id: &str) -> Self {
        self.consumer = Some(id.to_string());
        self
    }

    /// Returns the registry policy guards will use, if any guard is placed.
    #[must_use]
    pub fn guard_policy(&self) -> Option<RegistryPolicy> {
        match self.cycle_guard {
            Some(policy) => Some(policy),
            None if self.seeded_root => Some(RegistryPolicy::default()),
            None => None,
        }
    }
}
