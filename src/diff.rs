//! New-project detection against the stored watermark.
use crate::model::Project;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    /// Projects with `id > watermark`, in fetch order (highest id first).
    pub new_projects: Vec<Project>,
    /// Highest id in the fetch, `None` for an empty fetch.
    pub latest: Option<i64>,
    /// Value to persist; set whenever the fetch saw an id above the watermark.
    pub advance_to: Option<i64>,
}

/// `projects` is expected newest first, so `projects[0]` carries the
/// maximum id. The maximum is still taken over the whole list so an
/// out-of-order row cannot move the watermark backwards.
pub fn detect_new_projects(projects: &[Project], watermark: i64) -> Detection {
    let latest = projects.iter().map(|p| p.id).max();
    let Some(latest) = latest else {
        return Detection {
            new_projects: Vec::new(),
            latest: None,
            advance_to: None,
        };
    };

    let new_projects: Vec<Project> = if latest > watermark {
        projects
            .iter()
            .filter(|p| p.id > watermark)
            .cloned()
            .collect()
    } else {
        Vec::new()
    };

    let advance_to = (latest > watermark).then_some(latest);

    Detection {
        new_projects,
        latest: Some(latest),
        advance_to,
    }
}
