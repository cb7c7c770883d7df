//! Mapping an `<iframe>` element to its CDP frame and, for
//! out-of-process frames, to the child target session commands must be
//! routed through.

use serde_json::Value;
use tracing::debug;

use crate::cdp::{Connection, ConnectionConfig};
use crate::commands::{dom, page, runtime, target};
use crate::discovery;
use crate::error::{Error, Result};
use crate::finder::DOM_OPERATION_TIMEOUT;
use crate::tab::Tab;

/// World name prefix for isolated worlds created inside iframes.
const ISOLATED_WORLD_PREFIX: &str = "chromepilot::iframe";

/// Frame-related facts extracted from `DOM.describeNode` on the iframe
/// element.
#[derive(Debug, Default, Clone)]
pub(crate) struct FrameMetadata {
    /// Frame id of the iframe's content document, when the document is
    /// in-process and already known.
    pub frame_id: Option<String>,
    pub document_url: Option<String>,
    /// Frame the iframe element itself lives in.
    pub parent_frame_id: Option<String>,
    pub backend_node_id: Option<i64>,
}

impl FrameMetadata {
    pub(crate) fn from_node(node: &Value) -> Self {
        let content_document = &node["contentDocument"];
        let document_url = content_document["documentURL"]
            .as_str()
            .or_else(|| content_document["baseURL"].as_str())
            .or_else(|| node["documentURL"].as_str())
            .or_else(|| node["baseURL"].as_str())
            .map(ToOwned::to_owned);
        Self {
            frame_id: content_document["frameId"].as_str().map(ToOwned::to_owned),
            document_url,
            parent_frame_id: node["frameId"].as_str().map(ToOwned::to_owned),
            backend_node_id: node["backendNodeId"].as_i64(),
        }
    }
}

/// Fully resolved iframe context. For same-process iframes the session
/// fields are absent; for OOPIFs they carry the child target session all
/// further commands for the frame are routed through.
pub(crate) struct IFrameContext {
    pub frame_id: String,
    pub document_url: Option<String>,
    pub execution_context_id: i64,
    pub document_object_id: String,
    pub session_connection: Option<Connection>,
    pub session_id: Option<String>,
    pub child_target_id: Option<String>,
}

/// Every frame descriptor in a `Page.getFrameTree` reply, depth first.
pub(crate) fn walk_frames(tree: &Value) -> Vec<&Value> {
    let mut frames = Vec::new();
    let frame = &tree["frame"];
    if !frame.is_null() {
        frames.push(frame);
    }
    if let Some(children) = tree["childFrames"].as_array() {
        for child in children {
            frames.extend(walk_frames(child));
        }
    }
    frames
}

/// Id of the first frame in the tree whose `parentId` equals `parent_id`.
pub(crate) fn find_child_by_parent(tree: &Value, parent_id: &str) -> Option<String> {
    let children = tree["childFrames"].as_array()?;
    for child in children {
        let frame = &child["frame"];
        if frame["parentId"].as_str() == Some(parent_id) {
            return frame["id"].as_str().map(ToOwned::to_owned);
        }
        if let Some(found) = find_child_by_parent(child, parent_id) {
            return Some(found);
        }
    }
    None
}

/// Resolve the context of the iframe described by `meta` (obtained from
/// `DOM.describeNode` on the element). `tab` is the tab the element was
/// found on; its session carries the parent document, so frame-owner
/// checks are routed through it.
pub(crate) async fn resolve(tab: &Tab, meta: FrameMetadata) -> Result<IFrameContext> {
    let mut frame_id = meta.frame_id.clone();
    let mut document_url = meta.document_url.clone();

    if frame_id.is_none()
        && let Some(backend_node_id) = meta.backend_node_id
        && let Some((owner_frame_id, owner_url)) = find_frame_by_owner(tab, backend_node_id).await?
    {
        frame_id = Some(owner_frame_id);
        document_url = owner_url.or(document_url);
    }

    let mut session_connection = None;
    let mut session_id = None;
    let mut child_target_id = None;

    // A parent frame id with either no resolved frame or a backend-node
    // hint suggests the document may live in another process.
    let oopif_candidate = meta.parent_frame_id.is_some()
        && !(frame_id.is_some() && meta.backend_node_id.is_none());
    if oopif_candidate {
        let parent_frame_id = meta.parent_frame_id.clone().unwrap_or_default();
        if let Some(found) = resolve_oopif(tab, &parent_frame_id, meta.backend_node_id).await? {
            debug!(target_id = %found.target_id, "iframe resolved to child target");
            frame_id = Some(found.frame_id);
            document_url = found.document_url.or(document_url);
            session_connection = Some(found.connection);
            session_id = Some(found.session_id);
            child_target_id = Some(found.target_id);
        }
    }

    let Some(frame_id) = frame_id else {
        return Err(Error::InvalidIFrame(
            "unable to resolve a frame id for the iframe element".into(),
        ));
    };

    let execution_context_id = create_isolated_world(
        tab,
        session_connection.as_ref(),
        session_id.as_deref(),
        &frame_id,
    )
    .await?;

    let document_object_id = document_object_id(
        tab,
        session_connection.as_ref(),
        session_id.as_deref(),
        execution_context_id,
    )
    .await?;

    Ok(IFrameContext {
        frame_id,
        document_url,
        execution_context_id,
        document_object_id,
        session_connection,
        session_id,
        child_target_id,
    })
}

/// Scan the current session's frame tree for the frame whose owner
/// element has the given backend node id.
async fn find_frame_by_owner(
    tab: &Tab,
    backend_node_id: i64,
) -> Result<Option<(String, Option<String>)>> {
    let tree = tab.execute(page::get_frame_tree(), None).await?;
    let frames = walk_frames(&tree["frameTree"]);
    for frame in frames {
        let Some(candidate_id) = frame["id"].as_str() else {
            continue;
        };
        if owner_backend_node(tab, candidate_id).await? == Some(backend_node_id) {
            let url = frame["url"].as_str().map(ToOwned::to_owned);
            return Ok(Some((candidate_id.to_owned(), url)));
        }
    }
    Ok(None)
}

/// Backend node id of the element owning `frame_id`, asked of the tab's
/// own session (the owner element lives in the parent document).
async fn owner_backend_node(tab: &Tab, frame_id: &str) -> Result<Option<i64>> {
    match tab.execute(dom::get_frame_owner(frame_id), None).await {
        Ok(response) => Ok(response["backendNodeId"].as_i64()),
        // Unknown frame ids are a miss, not a failure.
        Err(Error::Protocol { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}

struct OopifMatch {
    connection: Connection,
    session_id: String,
    frame_id: String,
    document_url: Option<String>,
    target_id: String,
}

/// Walk the browser's target list looking for the child target backing
/// the iframe: first direct children of `parent_frame_id`, then every
/// iframe/page target, matching by frame-owner backend node id, finally
/// by frame tree structure.
async fn resolve_oopif(
    tab: &Tab,
    parent_frame_id: &str,
    backend_node_id: Option<i64>,
) -> Result<Option<OopifMatch>> {
    let Some((host, port)) = tab.endpoint() else {
        // Without the HTTP endpoint there is no browser-level connection
        // to enumerate targets through.
        return Ok(None);
    };

    let browser_ws = discovery::browser_ws_url(&host, port).await?;
    let connection = Connection::connect(&browser_ws, ConnectionConfig::default()).await?;

    let targets = connection
        .execute_command(target::get_targets(), None)
        .await?;
    let target_infos: Vec<Value> = targets["targetInfos"]
        .as_array()
        .cloned()
        .unwrap_or_default();

    let candidates: Vec<Value> = target_infos
        .into_iter()
        .filter(|info| matches!(info["type"].as_str(), Some("iframe" | "page")))
        .collect();

    let direct_children: Vec<Value> = candidates
        .iter()
        .filter(|info| info["parentFrameId"].as_str() == Some(parent_frame_id))
        .cloned()
        .collect();
    let single_child = direct_children.len() == 1;

    for info in &direct_children {
        let Some(found) = attach_and_inspect(&connection, info).await? else {
            continue;
        };
        if single_child && backend_node_id.is_none() {
            return Ok(Some(found));
        }
        if let Some(backend_node_id) = backend_node_id
            && owner_backend_node(tab, &found.frame_id).await? == Some(backend_node_id)
        {
            return Ok(Some(found));
        }
    }

    for info in &candidates {
        let Some(found) = attach_and_inspect(&connection, info).await? else {
            continue;
        };
        if let Some(backend_node_id) = backend_node_id
            && owner_backend_node(tab, &found.frame_id).await? == Some(backend_node_id)
        {
            return Ok(Some(found));
        }

        // Structural fallback: the attached target's tree may contain a
        // frame parented by ours.
        let tree = connection
            .execute_on_session(page::get_frame_tree(), &found.session_id, None)
            .await?;
        if let Some(child_frame_id) = find_child_by_parent(&tree["frameTree"], parent_frame_id) {
            return Ok(Some(OopifMatch {
                frame_id: child_frame_id,
                document_url: None,
                ..found
            }));
        }
    }

    Ok(None)
}

/// Attach to a target with a flat session and read its root frame.
async fn attach_and_inspect(
    connection: &Connection,
    info: &Value,
) -> Result<Option<OopifMatch>> {
    let Some(target_id) = info["targetId"].as_str() else {
        return Ok(None);
    };
    let attach = connection
        .execute_command(target::attach_to_target(target_id, true), None)
        .await?;
    let Some(session_id) = attach["sessionId"].as_str() else {
        return Ok(None);
    };

    let tree = connection
        .execute_on_session(page::get_frame_tree(), session_id, None)
        .await?;
    let root = &tree["frameTree"]["frame"];
    let Some(frame_id) = root["id"].as_str() else {
        return Ok(None);
    };

    Ok(Some(OopifMatch {
        connection: connection.clone(),
        session_id: session_id.to_owned(),
        frame_id: frame_id.to_owned(),
        document_url: root["url"].as_str().map(ToOwned::to_owned),
        target_id: target_id.to_owned(),
    }))
}

/// Create the isolated world for the frame on the effective session and
/// return its execution context id.
async fn create_isolated_world(
    tab: &Tab,
    session_connection: Option<&Connection>,
    session_id: Option<&str>,
    frame_id: &str,
) -> Result<i64> {
    let world_name = format!("{ISOLATED_WORLD_PREFIX}::{frame_id}");
    let command = page::create_isolated_world(frame_id, Some(&world_name), true);
    let response = match (session_connection, session_id) {
        (Some(connection), Some(session_id)) => {
            connection
                .execute_on_session(command, session_id, None)
                .await?
        }
        _ => tab.execute(command, None).await?,
    };
    response["executionContextId"].as_i64().ok_or_else(|| {
        Error::InvalidIFrame("isolated world creation yielded no execution context".into())
    })
}

/// Stable object id for the iframe's `document.documentElement`,
/// evaluated in the isolated world on the effective session.
async fn document_object_id(
    tab: &Tab,
    session_connection: Option<&Connection>,
    session_id: Option<&str>,
    execution_context_id: i64,
) -> Result<String> {
    let command = runtime::evaluate_in_context(
        "document.documentElement",
        execution_context_id,
        false,
    );
    let response = match (session_connection, session_id) {
        (Some(connection), Some(session_id)) => {
            connection
                .execute_on_session(command, session_id, Some(DOM_OPERATION_TIMEOUT))
                .await?
        }
        _ => tab.execute(command, Some(DOM_OPERATION_TIMEOUT)).await?,
    };
    response["result"]["objectId"]
        .as_str()
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            Error::InvalidIFrame("unable to obtain a document reference for the iframe".into())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_prefers_content_document_fields() {
        let node = json!({
            "frameId": "PARENT",
            "backendNodeId": 42,
            "contentDocument": {
                "frameId": "CHILD",
                "documentURL": "https://inner.example/doc",
            },
        });
        let meta = FrameMetadata::from_node(&node);
        assert_eq!(meta.frame_id.as_deref(), Some("CHILD"));
        assert_eq!(meta.document_url.as_deref(), Some("https://inner.example/doc"));
        assert_eq!(meta.parent_frame_id.as_deref(), Some("PARENT"));
        assert_eq!(meta.backend_node_id, Some(42));
    }

    #[test]
    fn metadata_falls_back_through_urls() {
        let node = json!({
            "frameId": "PARENT",
            "baseURL": "https://outer.example/",
            "contentDocument": { "baseURL": "https://inner.example/base" },
        });
        let meta = FrameMetadata::from_node(&node);
        assert_eq!(meta.document_url.as_deref(), Some("https://inner.example/base"));

        let bare = json!({ "frameId": "PARENT", "baseURL": "https://outer.example/" });
        let meta = FrameMetadata::from_node(&bare);
        assert_eq!(meta.document_url.as_deref(), Some("https://outer.example/"));
    }

    #[test]
    fn walk_frames_is_depth_first() {
        let tree = json!({
            "frame": {"id": "root"},
            "childFrames": [
                {
                    "frame": {"id": "a"},
                    "childFrames": [{"frame": {"id": "a1"}}],
                },
                {"frame": {"id": "b"}},
            ],
        });
        let ids: Vec<&str> = walk_frames(&tree)
            .iter()
            .map(|f| f["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["root", "a", "a1", "b"]);
    }

    #[test]
    fn find_child_by_parent_matches_nested_frames() {
        let tree = json!({
            "frame": {"id": "root"},
            "childFrames": [
                {
                    "frame": {"id": "mid", "parentId": "root"},
                    "childFrames": [
                        {"frame": {"id": "leaf", "parentId": "mid"}},
                    ],
                },
            ],
        });
        assert_eq!(find_child_by_parent(&tree, "mid").as_deref(), Some("leaf"));
        assert_eq!(find_child_by_parent(&tree, "root").as_deref(), Some("mid"));
        assert!(find_child_by_parent(&tree, "leaf").is_none());
    }
}
