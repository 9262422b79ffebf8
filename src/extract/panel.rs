//! Two-step panel protocol: a collapsible section must be revealed before
//! its rows can be read. Readers take a [`RevealedPanel`], which only
//! [`reveal`] can produce.

use std::time::Duration;
use tracing::debug;

use crate::browser::{PageSession, SessionError, WaitCondition, WaitOutcome};

#[derive(Debug, Clone, Copy)]
pub struct PanelSpec {
    pub name: &'static str,
    pub selector: &'static str,
    /// What the section itself must satisfy before it is clicked.
    pub ready: WaitCondition,
}

pub const DESCRIPTION_PANEL: PanelSpec = PanelSpec {
    name: "description",
    selector: r#"div[data-section-id="3"]"#,
    ready: WaitCondition::Present,
};

pub const DETAILS_PANEL: PanelSpec = PanelSpec {
    name: "details",
    selector: r#"div[data-section-id="4"]"#,
    ready: WaitCondition::Present,
};

pub const HISTORY_PANEL: PanelSpec = PanelSpec {
    name: "history",
    selector: r#"div[data-section-id="6"]"#,
    ready: WaitCondition::Clickable,
};

/// A panel that has been expanded on the session it came from.
#[derive(Debug, Clone)]
pub struct RevealedPanel<E> {
    spec: PanelSpec,
    root: E,
}

impl<E> RevealedPanel<E> {
    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn root(&self) -> &E {
        &self.root
    }
}

/// Wait for the panel's section, scroll it into view and click it open.
///
/// `TimedOut` means the section never became ready; callers decide whether
/// that is fatal.
pub async fn reveal<S: PageSession>(
    session: &S,
    spec: PanelSpec,
    timeout: Duration,
) -> Result<WaitOutcome<RevealedPanel<S::Element>>, SessionError> {
    let root = match session.wait_for(spec.selector, spec.ready, timeout).await? {
        WaitOutcome::Found(root) => root,
        WaitOutcome::TimedOut => return Ok(WaitOutcome::TimedOut),
    };

    session
        .execute_script("arguments[0].scrollIntoView({block: 'center'});", &[&root])
        .await?;
    session.click(&root).await?;
    debug!("Revealed {} panel", spec.name);

    Ok(WaitOutcome::Found(RevealedPanel { spec, root }))
}

/// Locate a section that needs no expanding click.
pub async fn locate<S: PageSession>(
    session: &S,
    spec: PanelSpec,
    timeout: Duration,
) -> Result<WaitOutcome<RevealedPanel<S::Element>>, SessionError> {
    Ok(match session.wait_for(spec.selector, spec.ready, timeout).await? {
        WaitOutcome::Found(root) => WaitOutcome::Found(RevealedPanel { spec, root }),
        WaitOutcome::TimedOut => WaitOutcome::TimedOut,
    })
}
