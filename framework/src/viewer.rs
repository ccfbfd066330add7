use std::rc::Rc;

use lib_geometry::{Aabb, Camera, Projection};
use lib_mesh_model::{Material, ModelSource};
use tracing::debug;

use crate::{
    host::Host, session::Session, status::StatusSink, Length, ViewerConfig, ViewerProps,
    ViewerResult, ViewerStatus,
};

/// Displays one model at a time inside a display region provided by the host.
///
/// Every change of the model locator replaces the whole viewing session (surface, renderer,
/// subscriptions), so at most one surface is attached to the region at any time.
pub struct ModelViewer<H: Host> {
    host: Rc<H>,
    props: ViewerProps,
    config: ViewerConfig,
    session: Option<Session<H>>,
    status_sink: StatusSink,
}

impl<H: Host> ModelViewer<H> {
    /// Sizes the display region and starts loading `props.locator`.
    pub fn mount(host: Rc<H>, props: ViewerProps, config: ViewerConfig) -> ViewerResult<Self> {
        config.validate()?;
        host.apply_region_size(&props.width, &props.height);

        let status_sink = StatusSink::default();
        let session = Session::start(
            Rc::clone(&host),
            ModelSource::new(props.locator.clone()),
            config.clone(),
            status_sink.clone(),
        )?;

        Ok(Self {
            host,
            props,
            config,
            session: Some(session),
            status_sink,
        })
    }

    /// Applies changed inputs. A new locator restarts the session, a new size only resizes.
    pub fn set_props(&mut self, props: ViewerProps) -> ViewerResult<()> {
        if props.width != self.props.width || props.height != self.props.height {
            self.set_size(props.width, props.height);
        }
        if props.locator != self.props.locator {
            self.set_model(props.locator)?;
        }
        Ok(())
    }

    /// Shows another model. The current session is torn down before the next one is built.
    ///
    /// Setting the locator that is already shown does nothing. After [`ModelViewer::unmount`] this
    /// mounts the viewer again.
    pub fn set_model(&mut self, locator: impl Into<String>) -> ViewerResult<()> {
        let locator = locator.into();
        if self.session.is_some() && locator == self.props.locator {
            return Ok(());
        }

        if let Some(previous) = self.session.take() {
            debug!("replacing model {} with {locator}", self.props.locator);
            previous.teardown();
        }
        self.props.locator = locator;

        let session = Session::start(
            Rc::clone(&self.host),
            ModelSource::new(self.props.locator.clone()),
            self.config.clone(),
            self.status_sink.clone(),
        )?;
        self.session = Some(session);
        Ok(())
    }

    /// Changes the size of the display region and adapts the running session right away.
    pub fn set_size(&mut self, width: Length, height: Length) {
        self.host.apply_region_size(&width, &height);
        self.props.width = width;
        self.props.height = height;
        if let Some(ref session) = self.session {
            session.resize();
        }
    }

    /// Registers the callback receiving every status change. Replaces any previous callback.
    ///
    /// While mounted the callback is invoked right away with the current status, so a failure
    /// reported during [`ModelViewer::mount`] is not missed.
    pub fn on_status(&mut self, callback: impl FnMut(&ViewerStatus) + 'static) {
        self.status_sink.set(Box::new(callback));
        if let Some(status) = self.status() {
            self.status_sink.notify(&status);
        }
    }

    /// Status of the current session, `None` when unmounted.
    #[must_use]
    pub fn status(&self) -> Option<ViewerStatus> {
        self.session.as_ref().map(Session::status)
    }

    #[must_use]
    pub fn props(&self) -> &ViewerProps {
        &self.props
    }

    #[must_use]
    pub fn source(&self) -> Option<ModelSource> {
        self.session.as_ref().map(Session::source)
    }

    #[must_use]
    pub fn camera(&self) -> Option<Camera> {
        self.session.as_ref().map(Session::camera)
    }

    #[must_use]
    pub fn projection(&self) -> Option<Projection> {
        self.session.as_ref().map(Session::projection)
    }

    /// Bounding box of the loaded model in scene space.
    #[must_use]
    pub fn model_bounds(&self) -> Option<Aabb> {
        self.session.as_ref().and_then(Session::model_bounds)
    }

    #[must_use]
    pub fn model_materials(&self) -> Vec<Material> {
        self.session
            .as_ref()
            .map(Session::model_materials)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.session.is_some()
    }

    /// Tears the current session down. Calling it again has no effect.
    pub fn unmount(&mut self) {
        if let Some(session) = self.session.take() {
            session.teardown();
        }
    }
}

impl<H: Host> Drop for ModelViewer<H> {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use glam::Vec3;
    use lib_mesh_model::{
        fixtures::{box_stl, triangle_glb},
        LoadError,
    };

    use super::*;
    use crate::{
        host::{PointerInput, SurfaceSize},
        test_support::TestHost,
    };

    fn mount(host: &Rc<TestHost>, locator: &str) -> ModelViewer<TestHost> {
        ModelViewer::mount(
            Rc::clone(host),
            ViewerProps::new(locator),
            ViewerConfig::default(),
        )
        .expect("test host never fails to mount")
    }

    #[test]
    fn offset_model_is_centered_on_the_origin() {
        let host = TestHost::new(800, 600);
        let viewer = mount(&host, "parts/offset.stl");
        host.resolve_fetch(0, Ok(box_stl(Vec3::new(10.0, 5.0, -3.0), Vec3::ONE)));

        let bounds = viewer.model_bounds().expect("model is loaded");
        assert!(
            bounds.center().abs_diff_eq(Vec3::ZERO, 1e-5),
            "center {} is at the origin",
            bounds.center()
        );
    }

    #[test]
    fn camera_distance_follows_the_largest_dimension() {
        let host = TestHost::new(800, 600);
        let viewer = mount(&host, "box.stl");
        host.resolve_fetch(0, Ok(box_stl(Vec3::ONE, Vec3::new(2.0, 4.0, 6.0))));
        host.run_frames(3);

        let camera = viewer.camera().expect("viewer is mounted");
        assert!(
            (camera.distance() - 9.0).abs() < 1e-4,
            "distance {} is 1.5 times the largest dimension",
            camera.distance()
        );
        assert_eq!(camera.look_at, Vec3::ZERO, "camera looks at the model");
    }

    #[test]
    fn loaded_status_is_reported() {
        let host = TestHost::new(800, 600);
        let mut viewer = mount(&host, "box.stl");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let recorder = Rc::clone(&seen);
        viewer.on_status(move |status| recorder.borrow_mut().push(status.clone()));

        assert_eq!(viewer.status(), Some(ViewerStatus::Loading), "load is pending");
        host.resolve_fetch(0, Ok(box_stl(Vec3::ZERO, Vec3::ONE)));

        assert_eq!(
            *seen.borrow(),
            vec![ViewerStatus::Loading, ViewerStatus::Loaded { triangles: 12 }],
            "callback sees the pending and the finished load"
        );
        assert_eq!(viewer.status(), Some(ViewerStatus::Loaded { triangles: 12 }), "status is kept");
    }

    #[test]
    fn late_status_callback_receives_an_unsupported_format_failure() {
        let host = TestHost::new(800, 600);
        let mut viewer = mount(&host, "drawing.step");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let recorder = Rc::clone(&seen);
        viewer.on_status(move |status| recorder.borrow_mut().push(status.clone()));
        host.run_frames(3);

        let seen = seen.borrow();
        let [status] = seen.as_slice() else {
            panic!("expected exactly one status, got {seen:?}");
        };
        assert!(status.is_failed(), "failure reaches the callback: {status}");
        assert_eq!(Some(status), viewer.status().as_ref(), "same as the kept status");
    }

    #[test]
    fn status_callback_is_not_replayed_after_unmount() {
        let host = TestHost::new(800, 600);
        let mut viewer = mount(&host, "box.stl");
        viewer.unmount();
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        viewer.on_status(move |_| *counter.borrow_mut() += 1);

        assert_eq!(*calls.borrow(), 0, "nothing to report while unmounted");
    }

    #[test]
    fn fetch_failure_is_reported_and_leaves_the_scene_empty() {
        let host = TestHost::new(800, 600);
        let viewer = mount(&host, "missing.stl");
        let error = LoadError::Fetch {
            locator: "missing.stl".to_owned(),
            message: "404 Not Found".to_owned(),
        };
        host.resolve_fetch(0, Err(error.clone()));
        host.run_frames(2);

        assert_eq!(viewer.status(), Some(ViewerStatus::Failed(error)), "failure is kept");
        assert_eq!(viewer.model_bounds(), None, "nothing was inserted");
        assert_eq!(host.log().frames, 2, "empty scene keeps rendering");
        assert_eq!(host.log().last_triangles, None, "no model drawn");
    }

    #[test]
    fn unrecognized_format_is_not_fetched() {
        let host = TestHost::new(800, 600);
        let viewer = mount(&host, "drawing.step");

        assert!(host.fetched_locators().is_empty(), "nothing is fetched");
        let status = viewer.status().expect("viewer is mounted");
        assert!(
            matches!(
                status,
                ViewerStatus::Failed(LoadError::UnsupportedFormat { ref extension, .. })
                    if extension.as_deref() == Some("step")
            ),
            "unexpected status {status:?}"
        );
    }

    #[test]
    fn materials_depend_on_the_format() {
        let host = TestHost::new(800, 600);
        let stl_viewer = mount(&host, "a.stl");
        host.resolve_fetch(0, Ok(box_stl(Vec3::ZERO, Vec3::ONE)));
        assert_eq!(
            stl_viewer.model_materials(),
            vec![lib_mesh_model::Material::Normal],
            "geometry-only models get normal shading"
        );

        let glb_viewer = mount(&host, "b.glb");
        host.resolve_fetch(1, Ok(triangle_glb()));
        let materials = glb_viewer.model_materials();
        assert_eq!(materials.len(), 1, "one material");
        assert!(
            materials.iter().all(|material| !material.is_synthetic()),
            "scene graphs keep their materials: {materials:?}"
        );
    }

    #[test]
    fn locator_changes_keep_a_single_surface() {
        let host = TestHost::new(800, 600);
        let mut viewer = mount(&host, "model-0.stl");
        for index in 1..=10 {
            viewer
                .set_model(format!("model-{index}.stl"))
                .expect("test host never fails to mount");
            assert_eq!(host.attached_surfaces(), 1, "one surface after change {index}");
        }

        assert_eq!(host.surfaces_created(), 11, "every change builds a new surface");
        assert_eq!(host.log().disposed, 10, "every replaced renderer is disposed");
        assert_eq!(host.resize_listeners(), 1, "old resize listeners are gone");
        assert_eq!(host.input_listeners(), 1, "old input listeners are gone");
        assert_eq!(host.frame_loops(), 1, "old frame loops are cancelled");
    }

    #[test]
    fn same_locator_does_not_restart() {
        let host = TestHost::new(800, 600);
        let mut viewer = mount(&host, "same.stl");
        viewer.set_model("same.stl").expect("no-op");

        assert_eq!(host.surfaces_created(), 1, "session is kept");
        assert_eq!(host.fetched_locators(), vec!["same.stl"], "fetched once");
    }

    #[test]
    fn stale_load_after_locator_change_is_discarded() {
        let host = TestHost::new(800, 600);
        let mut viewer = mount(&host, "first.stl");
        viewer.set_model("second.stl").expect("remount");

        host.resolve_fetch(0, Ok(box_stl(Vec3::ZERO, Vec3::ONE)));
        assert_eq!(viewer.status(), Some(ViewerStatus::Loading), "second load still pending");
        assert_eq!(viewer.model_bounds(), None, "first model was not inserted");

        host.resolve_fetch(1, Ok(box_stl(Vec3::ZERO, Vec3::splat(4.0))));
        let bounds = viewer.model_bounds().expect("second model is loaded");
        assert!((bounds.max_dimension() - 4.0).abs() < 1e-4, "second model is shown");
    }

    #[test]
    fn load_finishing_after_unmount_changes_nothing() {
        let host = TestHost::new(800, 600);
        let mut viewer = mount(&host, "late.stl");
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        viewer.on_status(move |_| *counter.borrow_mut() += 1);
        assert_eq!(*calls.borrow(), 1, "pending load is reported on registration");

        viewer.unmount();
        host.resolve_fetch(0, Ok(box_stl(Vec3::ZERO, Vec3::ONE)));

        assert_eq!(*calls.borrow(), 1, "no status after unmount");
        assert_eq!(viewer.status(), None, "unmounted");
        assert_eq!(host.log().frames, 0, "nothing rendered");
    }

    #[test]
    fn unmount_releases_everything_and_is_idempotent() {
        let host = TestHost::new(800, 600);
        let mut viewer = mount(&host, "box.stl");
        host.run_frames(2);

        viewer.unmount();
        viewer.unmount();
        host.fire_resize();
        host.run_frames(5);

        assert_eq!(host.attached_surfaces(), 0, "surface detached");
        assert_eq!(host.resize_listeners(), 0, "resize listener removed");
        assert_eq!(host.input_listeners(), 0, "input listener removed");
        assert_eq!(host.frame_loops(), 0, "frame loop cancelled");
        assert_eq!(host.log().disposed, 1, "renderer disposed once");
        assert_eq!(host.log().frames, 2, "no frames after unmount");
        assert!(!viewer.is_mounted(), "unmounted");
    }

    #[test]
    fn dropping_the_viewer_tears_down() {
        let host = TestHost::new(800, 600);
        drop(mount(&host, "box.stl"));

        assert_eq!(host.attached_surfaces(), 0, "surface detached");
        assert_eq!(host.frame_loops(), 0, "frame loop cancelled");
        assert_eq!(host.log().disposed, 1, "renderer disposed");
    }

    #[test]
    fn set_model_after_unmount_mounts_again() {
        let host = TestHost::new(800, 600);
        let mut viewer = mount(&host, "box.stl");
        viewer.unmount();
        viewer.set_model("box.stl").expect("remount");

        assert!(viewer.is_mounted(), "mounted again");
        assert_eq!(host.attached_surfaces(), 1, "one surface");
    }

    #[test]
    fn aspect_ratio_follows_the_region() {
        let host = TestHost::new(800, 600);
        let viewer = mount(&host, "box.stl");
        let aspect = viewer.projection().expect("mounted").aspect_ratio();
        assert!((aspect - 4.0 / 3.0).abs() < 1e-4, "initial aspect {aspect}");

        host.set_region_size(400, 400);
        host.fire_resize();

        let aspect = viewer.projection().expect("mounted").aspect_ratio();
        assert!((aspect - 1.0).abs() < 1e-6, "aspect after resize {aspect}");
        assert_eq!(
            host.log().sizes.last(),
            Some(&SurfaceSize::new(400, 400)),
            "renderer is resized"
        );
        assert_eq!(
            host.attached_surface_size(),
            Some(SurfaceSize::new(400, 400)),
            "surface is resized"
        );
    }

    #[test]
    fn surface_uses_physical_pixels() {
        let host = TestHost::new(300, 200);
        host.set_pixel_ratio(2.0);
        let _viewer = mount(&host, "box.stl");

        assert_eq!(
            host.attached_surface_size(),
            Some(SurfaceSize::new(600, 400)),
            "backing store is scaled"
        );
    }

    #[test]
    fn empty_region_is_ignored_on_resize() {
        let host = TestHost::new(800, 600);
        let viewer = mount(&host, "box.stl");
        host.set_region_size(0, 0);
        host.fire_resize();

        let projection = viewer.projection().expect("mounted");
        assert_eq!(projection.surface_dimensions(), (800, 600), "last size is kept");
    }

    #[test]
    fn set_size_applies_and_resizes() {
        let host = TestHost::new(800, 600);
        let mut viewer = mount(&host, "box.stl");
        assert_eq!(
            host.applied_size(),
            Some(("100%".to_owned(), "500px".to_owned())),
            "default size is applied on mount"
        );

        for (width, height, aspect) in [(800_u32, 600_u32, 4.0 / 3.0), (400, 400, 1.0)] {
            let resizes = host.log().sizes.len();
            host.set_region_size(width, height);
            viewer.set_size(Length::from(width), Length::from(height));

            assert_eq!(
                host.applied_size(),
                Some((format!("{width}px"), format!("{height}px"))),
                "new size is applied"
            );
            assert_eq!(
                (&viewer.props().width, &viewer.props().height),
                (&Length::from(width), &Length::from(height)),
                "props follow"
            );
            let projection = viewer.projection().expect("mounted");
            assert_eq!(projection.surface_dimensions(), (width, height), "projection follows");
            assert!(
                (projection.aspect_ratio() - aspect).abs() < 1e-4,
                "aspect {} for {width}x{height}",
                projection.aspect_ratio()
            );
            assert_eq!(
                host.log().sizes.last(),
                Some(&SurfaceSize::new(width, height)),
                "renderer is resized to {width}x{height}"
            );
            assert_eq!(host.log().sizes.len(), resizes + 1, "one renderer resize per change");
        }
        assert_eq!(host.surfaces_created(), 1, "resizing does not remount");
    }

    #[test]
    fn mount_applies_the_requested_size() {
        let host = TestHost::new(640, 480);
        let height = "50vh".parse::<Length>().expect("valid CSS length");
        let viewer = ModelViewer::mount(
            Rc::clone(&host),
            ViewerProps::new("box.stl").with_size(640_u32, height),
            ViewerConfig::default(),
        )
        .expect("test host never fails to mount");

        assert_eq!(
            host.applied_size(),
            Some(("640px".to_owned(), "50vh".to_owned())),
            "requested size is applied"
        );
        assert_eq!(viewer.props().locator, "box.stl", "locator is kept");
    }

    #[test]
    fn input_moves_the_camera() {
        let host = TestHost::new(800, 600);
        let viewer = mount(&host, "box.stl");
        host.resolve_fetch(0, Ok(box_stl(Vec3::ZERO, Vec3::splat(2.0))));
        let before = viewer.camera().expect("mounted");

        host.fire_input(PointerInput::Rotate {
            delta_x: 120.0,
            delta_y: 0.0,
        });
        host.run_frames(10);

        let after = viewer.camera().expect("mounted");
        assert_ne!(before.position, after.position, "camera orbits");
        assert!(
            (after.distance() - before.distance()).abs() < 1e-3,
            "orbiting keeps the distance"
        );
    }

    #[test]
    fn failing_attach_releases_what_was_set_up() {
        let host = TestHost::new(800, 600);
        host.fail_attach();
        let result = ModelViewer::mount(
            Rc::clone(&host),
            ViewerProps::new("box.stl"),
            ViewerConfig::default(),
        );

        assert!(result.is_err(), "mount fails");
        assert_eq!(host.log().disposed, 1, "renderer is disposed");
        assert_eq!(host.frame_loops(), 0, "no frame loop");
        assert!(host.fetched_locators().is_empty(), "no fetch started");
    }

    #[test]
    fn invalid_config_is_rejected_before_anything_is_built() {
        let host = TestHost::new(800, 600);
        let config = ViewerConfig {
            near: 10.0,
            far: 1.0,
            ..ViewerConfig::default()
        };
        let result = ModelViewer::mount(Rc::clone(&host), ViewerProps::new("box.stl"), config);

        assert!(result.is_err(), "near must be below far");
        assert_eq!(host.surfaces_created(), 0, "nothing built");
    }
}
