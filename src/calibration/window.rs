//! Trackbar window for calibration.
//!
//! The egui event loop has to own the main thread, so the session runs on a
//! worker and talks to the window over two channels: preview frames flow to
//! the window, slider changes and the confirm key flow back.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, OnceLock};

use eframe::egui;
use tracing::{debug, info};

use crate::calibration::controls::{Channel, ChannelSettings, ControlEvent, ControlSurface};
use crate::calibration::preview::PreviewDisplay;
use crate::error::{CalibrationError, Result};
use crate::video::{Dimensions, Frame};

const WINDOW_TITLE: &str = "chroma-keyer - Colour Threshold";

/// Height reserved under the preview for the six sliders and the hint line
const CONTROLS_HEIGHT: f32 = 230.0;

enum WindowUpdate {
    Preview(Frame),
    Close,
}

enum OperatorInput {
    Moved(ChannelSettings),
    Confirm,
}

/// Create the three halves of a trackbar window session.
///
/// `TrackbarWindow` goes to [`show_trackbar_window`] on the main thread, the
/// controls and preview go to the calibrator on the worker.
pub fn trackbar_window(preview_size: Dimensions) -> (TrackbarWindow, WindowControls, WindowPreview) {
    let (update_tx, update_rx) = mpsc::channel();
    let (input_tx, input_rx) = mpsc::channel();
    let repaint = Arc::new(OnceLock::new());

    let window = TrackbarWindow {
        preview_size,
        settings: ChannelSettings::default(),
        published: ChannelSettings::default(),
        updates: update_rx,
        input: Some(input_tx),
        texture: None,
        latest: None,
        confirmed: false,
        close_requested: false,
        repaint: Arc::clone(&repaint),
    };
    let controls = WindowControls {
        settings: ChannelSettings::default(),
        input: input_rx,
    };
    let preview = WindowPreview {
        updates: update_tx,
        repaint,
    };

    (window, controls, preview)
}

/// Run the window until calibration closes it or the operator does.
///
/// Blocks the calling thread, which must be the main thread on most
/// platforms.
pub fn show_trackbar_window(window: TrackbarWindow) -> Result<()> {
    let size = window.preview_size;
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([
                (size.width() as f32).max(420.0) + 16.0,
                size.height() as f32 + CONTROLS_HEIGHT,
            ])
            .with_title(WINDOW_TITLE),
        renderer: eframe::Renderer::Wgpu,
        ..Default::default()
    };

    eframe::run_native(
        WINDOW_TITLE,
        options,
        Box::new(move |cc| {
            let _ = window.repaint.set(cc.egui_ctx.clone());
            Ok(Box::new(window))
        }),
    )
    .map_err(|e| CalibrationError::Display {
        reason: format!("cannot open calibration window: {}", e),
    })?;

    Ok(())
}

/// Six `0..=255` sliders over the live keyed preview; Enter confirms
pub struct TrackbarWindow {
    preview_size: Dimensions,
    settings: ChannelSettings,
    published: ChannelSettings,
    updates: Receiver<WindowUpdate>,
    input: Option<Sender<OperatorInput>>,
    texture: Option<egui::TextureHandle>,
    latest: Option<Frame>,
    confirmed: bool,
    close_requested: bool,
    repaint: Arc<OnceLock<egui::Context>>,
}

impl TrackbarWindow {
    /// Take everything the calibrator has sent since the last repaint
    fn drain_updates(&mut self) {
        loop {
            match self.updates.try_recv() {
                Ok(WindowUpdate::Preview(frame)) => self.latest = Some(frame),
                Ok(WindowUpdate::Close) | Err(TryRecvError::Disconnected) => {
                    self.close_requested = true;
                    break;
                }
                Err(TryRecvError::Empty) => break,
            }
        }
    }

    /// Forward slider moves, then the confirm key, to the calibrator
    fn publish(&mut self, confirm: bool) {
        let Some(input) = &self.input else {
            return;
        };

        if self.settings != self.published {
            if input.send(OperatorInput::Moved(self.settings)).is_err() {
                self.input = None;
                return;
            }
            self.published = self.settings;
        }

        if confirm && !self.confirmed {
            if input.send(OperatorInput::Confirm).is_ok() {
                self.confirmed = true;
                info!("Colour threshold confirmed from the window");
            }
        }
    }

    fn sliders(&mut self, ui: &mut egui::Ui) {
        for channel in Channel::ALL {
            let mut value = self.settings.get(channel);
            ui.add(egui::Slider::new(&mut value, 0..=255).text(channel.to_string()));
            self.settings.set(channel, i32::from(value));
        }
    }
}

impl eframe::App for TrackbarWindow {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_updates();

        if let Some(frame) = self.latest.take() {
            let image = preview_image(&frame);
            match &mut self.texture {
                Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
                None => {
                    self.texture = Some(ctx.load_texture("keyed-preview", image, egui::TextureOptions::LINEAR))
                }
            }
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            let size = egui::vec2(self.preview_size.width() as f32, self.preview_size.height() as f32);
            match &self.texture {
                Some(texture) => {
                    ui.image((texture.id(), size));
                }
                None => {
                    let (rect, _) = ui.allocate_exact_size(size, egui::Sense::hover());
                    ui.painter().rect_filled(rect, 0.0, egui::Color32::from_rgb(20, 20, 20));
                }
            }

            ui.separator();
            ui.add_enabled_ui(!self.confirmed, |ui| self.sliders(ui));
            ui.separator();

            let hint = if self.confirmed {
                "Threshold confirmed, processing..."
            } else {
                "Adjust the sliders until only the backdrop is replaced, then press ENTER."
            };
            ui.label(hint);
        });

        let confirm = ctx.input(|i| i.key_pressed(egui::Key::Enter));
        self.publish(confirm);

        if self.close_requested {
            debug!("Closing calibration window");
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }
}

/// Calibrator-side controls fed by the window's sliders
pub struct WindowControls {
    settings: ChannelSettings,
    input: Receiver<OperatorInput>,
}

impl ControlSurface for WindowControls {
    fn settings(&self) -> ChannelSettings {
        self.settings
    }

    fn wait_event(&mut self) -> Result<ControlEvent> {
        match self.input.recv() {
            Ok(OperatorInput::Moved(settings)) => {
                self.settings = settings;
                Ok(ControlEvent::Adjusted)
            }
            Ok(OperatorInput::Confirm) => Ok(ControlEvent::Confirm),
            // Window gone without a confirm
            Err(_) => Err(CalibrationError::ControlsClosed.into()),
        }
    }
}

/// Calibrator-side display that hands frames to the window
pub struct WindowPreview {
    updates: Sender<WindowUpdate>,
    repaint: Arc<OnceLock<egui::Context>>,
}

impl WindowPreview {
    fn wake(&self) {
        if let Some(ctx) = self.repaint.get() {
            ctx.request_repaint();
        }
    }
}

impl PreviewDisplay for WindowPreview {
    fn show(&mut self, frame: &Frame) -> Result<()> {
        self.updates
            .send(WindowUpdate::Preview(frame.clone()))
            .map_err(|_| CalibrationError::Display {
                reason: "the calibration window was closed".to_string(),
            })?;
        self.wake();
        Ok(())
    }

    fn close(&mut self) {
        let _ = self.updates.send(WindowUpdate::Close);
        self.wake();
    }
}

/// Convert a frame into an egui texture image
pub fn preview_image(frame: &Frame) -> egui::ColorImage {
    egui::ColorImage::from_rgb(
        [frame.width() as usize, frame.height() as usize],
        frame.as_rgb_bytes(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompositorError;

    fn dims(width: i64, height: i64) -> Dimensions {
        Dimensions::new(width, height).unwrap()
    }

    #[test]
    fn test_slider_moves_reach_the_calibrator() {
        let (mut window, mut controls, _preview) = trackbar_window(dims(6, 4));

        window.settings.set(Channel::UpperG, 255);
        window.settings.set(Channel::LowerG, 180);
        window.publish(false);
        // Nothing changed, nothing sent
        window.publish(false);
        window.publish(true);

        assert_eq!(controls.wait_event().unwrap(), ControlEvent::Adjusted);
        assert_eq!(
            controls.settings().bound(),
            crate::keying::ColorBound::new([0, 180, 0], [0, 255, 0])
        );
        assert_eq!(controls.wait_event().unwrap(), ControlEvent::Confirm);
    }

    #[test]
    fn test_confirm_is_sent_once() {
        let (mut window, mut controls, _preview) = trackbar_window(dims(6, 4));
        window.publish(true);
        window.publish(true);
        drop(window);

        assert_eq!(controls.wait_event().unwrap(), ControlEvent::Confirm);
        assert!(controls.wait_event().is_err());
    }

    #[test]
    fn test_closing_the_window_closes_the_controls() {
        let (window, mut controls, _preview) = trackbar_window(dims(6, 4));
        drop(window);

        let err = controls.wait_event().unwrap_err();
        assert!(matches!(
            err,
            CompositorError::Calibration(CalibrationError::ControlsClosed)
        ));
    }

    #[test]
    fn test_preview_frames_and_close_reach_the_window() {
        let (mut window, _controls, mut preview) = trackbar_window(dims(2, 2));
        let first = Frame::new_filled(dims(2, 2), [1, 2, 3]);
        let second = Frame::new_filled(dims(2, 2), [4, 5, 6]);

        preview.show(&first).unwrap();
        preview.show(&second).unwrap();
        window.drain_updates();
        assert_eq!(window.latest.as_ref(), Some(&second));
        assert!(!window.close_requested);

        preview.close();
        window.drain_updates();
        assert!(window.close_requested);
    }

    #[test]
    fn test_show_after_window_closed_fails() {
        let (window, _controls, mut preview) = trackbar_window(dims(2, 2));
        drop(window);

        let err = preview.show(&Frame::new_filled(dims(2, 2), [0, 0, 0])).unwrap_err();
        assert!(matches!(
            err,
            CompositorError::Calibration(CalibrationError::Display { .. })
        ));
    }

    #[test]
    fn test_preview_image_keeps_pixels() {
        let frame = Frame::from_fn(dims(3, 2), |x, y| [x as u8 * 50, y as u8 * 100, 7]);
        let image = preview_image(&frame);

        assert_eq!(image.size, [3, 2]);
        assert_eq!(image.pixels[4], egui::Color32::from_rgb(50, 100, 7));
    }
}
