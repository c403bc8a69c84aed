//! Live video widget: draws the latest camera frame and its face annotations.

use gtk4 as gtk;

use gtk::cairo;
use gtk::glib;
use gtk::prelude::*;
use gtk::subclass::prelude::*;

use log::warn;
use std::cell::RefCell;

use rollcall_core::{Annotation, CameraFrame};

mod imp {
    use super::*;

    #[derive(Default)]
    pub struct VideoView {
        pub surface: RefCell<Option<cairo::ImageSurface>>,
        pub annotations: RefCell<Vec<Annotation>>,
    }

    #[glib::object_subclass]
    impl ObjectSubclass for VideoView {
        const NAME: &'static str = "RollcallVideoView";
        type Type = super::VideoView;
        type ParentType = gtk::DrawingArea;
    }

    impl ObjectImpl for VideoView {
        fn constructed(&self) {
            self.parent_constructed();

            let obj = self.obj();
            obj.set_hexpand(true);
            obj.set_vexpand(true);
            obj.set_content_width(640);
            obj.set_content_height(480);

            obj.set_draw_func(|widget, cr, width, height| {
                let Some(view) = widget.downcast_ref::<super::VideoView>() else {
                    return;
                };
                if let Err(e) = view.draw(cr, width, height) {
                    warn!("Failed to draw video frame: {}", e);
                }
            });
        }
    }

    impl WidgetImpl for VideoView {}
    impl DrawingAreaImpl for VideoView {}
}

glib::wrapper! {
    pub struct VideoView(ObjectSubclass<imp::VideoView>)
        @extends gtk::Widget, gtk::DrawingArea;
}

impl VideoView {
    pub fn new() -> Self {
        glib::Object::new()
    }

    /// Show a new frame with the faces recognized in it.
    pub fn set_frame(&self, frame: &CameraFrame, annotations: Vec<Annotation>) {
        let imp = self.imp();

        match rgb_surface(frame) {
            Ok(surface) => *imp.surface.borrow_mut() = Some(surface),
            Err(e) => {
                warn!("Dropping {}x{} frame: {}", frame.width, frame.height, e);
                return;
            }
        }
        *imp.annotations.borrow_mut() = annotations;

        self.queue_draw();
    }

    pub fn clear(&self) {
        let imp = self.imp();
        imp.surface.borrow_mut().take();
        imp.annotations.borrow_mut().clear();
        self.queue_draw();
    }

    fn draw(&self, cr: &cairo::Context, width: i32, height: i32) -> Result<(), cairo::Error> {
        let imp = self.imp();

        let w = width as f64;
        let h = height as f64;

        cr.set_source_rgb(0.12, 0.12, 0.12);
        cr.paint()?;

        let surface = imp.surface.borrow();
        let Some(surface) = surface.as_ref() else {
            cr.set_source_rgb(0.6, 0.6, 0.6);
            cr.select_font_face("Sans", cairo::FontSlant::Normal, cairo::FontWeight::Normal);
            cr.set_font_size(16.0);
            let text = "Camera stopped";
            let extents = cr.text_extents(text)?;
            cr.move_to((w - extents.width()) / 2.0, h / 2.0);
            cr.show_text(text)?;
            return Ok(());
        };

        // Fit the frame into the widget, keeping its aspect ratio
        let frame_w = surface.width() as f64;
        let frame_h = surface.height() as f64;
        let scale = (w / frame_w).min(h / frame_h);

        cr.save()?;
        cr.translate((w - frame_w * scale) / 2.0, (h - frame_h * scale) / 2.0);
        cr.scale(scale, scale);

        cr.set_source_surface(surface, 0.0, 0.0)?;
        cr.paint()?;

        // Green box and label per recognized face, in frame coordinates
        cr.set_source_rgb(0.0, 1.0, 0.0);
        cr.set_line_width(2.0);
        cr.select_font_face("Sans", cairo::FontSlant::Normal, cairo::FontWeight::Bold);
        cr.set_font_size(20.0);

        for annotation in imp.annotations.borrow().iter() {
            let region = annotation.region;
            cr.rectangle(
                region.x as f64,
                region.y as f64,
                region.width as f64,
                region.height as f64,
            );
            cr.stroke()?;

            cr.move_to(region.x as f64, region.y as f64 - 10.0);
            cr.show_text(&annotation.label())?;
        }

        cr.restore()?;
        Ok(())
    }
}

impl Default for VideoView {
    fn default() -> Self {
        Self::new()
    }
}

/// Packs RGB8 pixels into a cairo RGB24 surface (native-endian `0x00RRGGBB`).
fn rgb_surface(frame: &CameraFrame) -> Result<cairo::ImageSurface, cairo::Error> {
    if !frame.is_valid() {
        return Err(cairo::Error::InvalidSize);
    }

    let format = cairo::Format::Rgb24;
    let stride = format.stride_for_width(frame.width)?;
    let mut data = vec![0u8; stride as usize * frame.height as usize];

    let row_len = frame.width as usize * 3;
    for (y, row) in frame.rgb_data.chunks_exact(row_len).enumerate() {
        let out = &mut data[y * stride as usize..];
        for (x, px) in row.chunks_exact(3).enumerate() {
            let value = (px[0] as u32) << 16 | (px[1] as u32) << 8 | px[2] as u32;
            out[x * 4..x * 4 + 4].copy_from_slice(&value.to_ne_bytes());
        }
    }

    cairo::ImageSurface::create_for_data(
        data,
        format,
        frame.width as i32,
        frame.height as i32,
        stride,
    )
}
