//! Path templating for backup destinations
//!
//! Backup paths are templates evaluated against the `EtcdBackup` they belong
//! to, so one manifest can produce a distinct object per resource:
//!
//! ```text
//! path: "etcd-snapshots/{{ .Namespace }}/{{ .Name }}.db"
//! ```
//!
//! Rendering uses minijinja with strict undefined handling. Go-template field
//! paths (`{{.Name}}`, `{{ .spec.etcdUrl }}`) are accepted by dropping the
//! leading dot before rendering.

mod context;
mod engine;
mod error;

pub use context::TemplateContext;
pub use engine::TemplateEngine;
pub use error::TemplateError;
