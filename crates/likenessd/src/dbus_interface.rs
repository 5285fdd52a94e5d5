use crate::engine::{EngineError, EngineHandle};
use crate::stills::Stills;
use likeness_core::{Enrollment, Identity, MatchResult, TemplateStore, Threshold};
use likeness_store::SqliteTemplateStore;
use std::path::PathBuf;
use std::sync::Arc;
use zbus::interface;

pub const BUS_NAME: &str = "org.freedesktop.Likeness1";
pub const OBJECT_PATH: &str = "/org/freedesktop/Likeness1";

/// D-Bus interface for the Likeness daemon.
///
/// Camera work goes through the engine thread, image files through the
/// still pipeline; listing and removal talk to the template store directly.
pub struct LikenessService {
    pub engine: EngineHandle,
    pub stills: Arc<Stills>,
    pub store: Arc<SqliteTemplateStore>,
    pub threshold: Threshold,
    pub camera_device: String,
}

fn failed(e: impl std::fmt::Display) -> zbus::fdo::Error {
    zbus::fdo::Error::Failed(e.to_string())
}

fn engine_failed(e: EngineError) -> zbus::fdo::Error {
    tracing::warn!(error = %e, "request failed");
    failed(e)
}

/// Identity names are compared after trimming surrounding whitespace.
fn identity_arg(name: &str) -> zbus::fdo::Result<Identity> {
    let name = name.trim();
    if name.is_empty() {
        return Err(zbus::fdo::Error::InvalidArgs("name must not be empty".into()));
    }
    Ok(Identity::new(name))
}

fn enrollment_json(enrollment: &Enrollment) -> String {
    serde_json::json!({
        "identity": enrollment.identity,
        "samples": enrollment.samples,
        "dim": enrollment.template.dim(),
    })
    .to_string()
}

fn verdict_json(result: &MatchResult) -> String {
    let mut json = serde_json::json!({
        "identity": result.identity,
        "score": result.score,
        "accepted": result.accepted,
    });
    if result.is_no_enrolled_identities() {
        json["reason"] = "no enrolled identities".into();
    }
    json.to_string()
}

#[interface(name = "org.freedesktop.Likeness1")]
impl LikenessService {
    /// Capture an enrollment window and store the averaged template.
    async fn enroll(&self, name: &str) -> zbus::fdo::Result<String> {
        let identity = identity_arg(name)?;
        tracing::info!(identity = %identity, "enroll requested");
        let enrollment = self.engine.enroll(identity).await.map_err(engine_failed)?;
        Ok(enrollment_json(&enrollment))
    }

    /// Enroll from image files readable by the daemon. Each image must
    /// show a face; their embeddings are averaged into one template.
    async fn enroll_image(&self, name: &str, paths: Vec<String>) -> zbus::fdo::Result<String> {
        let identity = identity_arg(name)?;
        if paths.is_empty() {
            return Err(zbus::fdo::Error::InvalidArgs("no image paths given".into()));
        }
        tracing::info!(identity = %identity, images = paths.len(), "enroll_image requested");
        let enrollment = self
            .stills
            .enroll(identity, paths.into_iter().map(PathBuf::from).collect())
            .await
            .map_err(engine_failed)?;
        Ok(enrollment_json(&enrollment))
    }

    /// Abort the enrollment in progress, if any.
    async fn cancel_enroll(&self) -> zbus::fdo::Result<bool> {
        tracing::info!("enroll cancellation requested");
        self.engine.cancel_enroll();
        Ok(true)
    }

    /// Identify the face currently in front of the camera.
    async fn identify(&self) -> zbus::fdo::Result<String> {
        tracing::info!("identify requested");
        let result = self.engine.identify().await.map_err(engine_failed)?;
        Ok(verdict_json(&result))
    }

    /// Identify the face in an image file readable by the daemon.
    async fn identify_image(&self, path: &str) -> zbus::fdo::Result<String> {
        tracing::info!(path, "identify_image requested");
        let result = self
            .stills
            .identify(PathBuf::from(path))
            .await
            .map_err(engine_failed)?;
        Ok(verdict_json(&result))
    }

    /// List enrolled identities as JSON.
    async fn list_identities(&self) -> zbus::fdo::Result<String> {
        let identities = self.store.list().map_err(failed)?;
        serde_json::to_string(&identities).map_err(failed)
    }

    /// Remove an enrolled identity by name.
    async fn remove_identity(&self, name: &str) -> zbus::fdo::Result<bool> {
        let identity = identity_arg(name)?;
        tracing::info!(identity = %identity, "remove_identity requested");
        self.store.remove(&identity).map_err(failed)
    }

    /// Return daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let enrolled = self.store.get_all().map_err(failed)?.len();
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "camera": self.camera_device,
            "threshold": self.threshold.value(),
            "enrolled": enrolled,
            "db_path": self.store.path().display().to_string(),
        })
        .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_json_accepted() {
        let json: serde_json::Value = serde_json::from_str(&verdict_json(&MatchResult {
            identity: Some(Identity::new("alice")),
            score: Some(0.8),
            accepted: true,
        }))
        .unwrap();
        assert_eq!(json["identity"], "alice");
        assert_eq!(json["accepted"], true);
        assert!(json.get("reason").is_none());
    }

    #[test]
    fn test_verdict_json_empty_gallery() {
        let json: serde_json::Value =
            serde_json::from_str(&verdict_json(&MatchResult::no_enrolled_identities())).unwrap();
        assert!(json["identity"].is_null());
        assert!(json["score"].is_null());
        assert_eq!(json["reason"], "no enrolled identities");
    }

    #[test]
    fn test_identity_arg_trims_for_every_method() {
        assert_eq!(identity_arg("alice ").unwrap(), Identity::new("alice"));
        assert_eq!(identity_arg("\talice").unwrap(), identity_arg("alice").unwrap());
        assert!(matches!(
            identity_arg("   "),
            Err(zbus::fdo::Error::InvalidArgs(_))
        ));
    }
}
