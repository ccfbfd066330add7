use std::{
    cell::RefCell,
    fmt::{self, Display},
    rc::Rc,
};

use lib_mesh_model::LoadError;

/// Progress of loading the current model.
#[derive(Clone, Debug, PartialEq)]
pub enum ViewerStatus {
    Loading,
    Loaded { triangles: usize },
    /// Terminal for the current locator. The scene stays lit but empty.
    Failed(LoadError),
}

impl ViewerStatus {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, ViewerStatus::Failed(_))
    }
}

impl Display for ViewerStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewerStatus::Loading => formatter.write_str("loading"),
            ViewerStatus::Loaded { triangles } => write!(formatter, "loaded ({triangles} triangles)"),
            ViewerStatus::Failed(error) => write!(formatter, "failed: {error}"),
        }
    }
}

pub(crate) type StatusCallback = Box<dyn FnMut(&ViewerStatus)>;

/// The status callback, shared between a viewer and its sessions.
#[derive(Clone, Default)]
pub(crate) struct StatusSink(Rc<RefCell<Option<StatusCallback>>>);

impl StatusSink {
    pub(crate) fn set(&self, callback: StatusCallback) {
        *self.0.borrow_mut() = Some(callback);
    }

    /// Invokes the callback, if any.
    ///
    /// The callback is taken out of the sink while it runs, so it may install a replacement
    /// without running into a borrow conflict.
    pub(crate) fn notify(&self, status: &ViewerStatus) {
        let Some(mut callback) = self.0.borrow_mut().take() else {
            return;
        };
        callback(status);
        let mut slot = self.0.borrow_mut();
        if slot.is_none() {
            *slot = Some(callback);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callbacks_may_replace_themselves() {
        let sink = StatusSink::default();
        let calls = Rc::new(RefCell::new(Vec::new()));

        let inner_sink = sink.clone();
        let inner_calls = Rc::clone(&calls);
        sink.set(Box::new(move |status| {
            inner_calls.borrow_mut().push(format!("first: {status}"));
            let replacement_calls = Rc::clone(&inner_calls);
            inner_sink.set(Box::new(move |status| {
                replacement_calls.borrow_mut().push(format!("second: {status}"));
            }));
        }));

        sink.notify(&ViewerStatus::Loading);
        sink.notify(&ViewerStatus::Loaded { triangles: 12 });

        assert_eq!(
            *calls.borrow(),
            vec!["first: loading", "second: loaded (12 triangles)"],
            "replacement takes over"
        );
    }

    #[test]
    fn notify_without_callback_is_a_no_op() {
        StatusSink::default().notify(&ViewerStatus::Loading);
    }
}
