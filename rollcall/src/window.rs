use gtk4 as gtk;
use libadwaita as adw;

use adw::prelude::*;
use adw::subclass::prelude::*;
use gtk::gio;
use gtk::glib;

use anyhow::Context;
use log::{debug, info, warn};
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use rollcall_core::{
    Counters, FrameReport, LoopEvent, LoopState, RecognitionController, RollcallError, Roster,
    StopReason,
};

use crate::app::RollcallApplication;
use crate::widgets::video_view::VideoView;

const ROSTER_NOT_LOADED: &str = "Please load ID names first!";

mod imp {
    use super::*;

    #[derive(Debug, Default)]
    pub struct RollcallWindow {
        // State
        pub controller: RefCell<Option<RecognitionController>>,
        pub roster: RefCell<Option<Arc<Roster>>>,
        pub quit_key: Cell<char>,
        // Bumped on every start/stop so events from an older run are ignored
        pub generation: Cell<u64>,

        // UI widgets
        pub toast_overlay: RefCell<Option<adw::ToastOverlay>>,
        pub btn_load: RefCell<Option<gtk::Button>>,
        pub btn_start: RefCell<Option<gtk::Button>>,
        pub btn_stop: RefCell<Option<gtk::Button>>,
        pub list_names: RefCell<Option<gtk::ListBox>>,
        pub lbl_counter: RefCell<Option<gtk::Label>>,
        pub lbl_accuracy: RefCell<Option<gtk::Label>>,
        pub video_view: RefCell<Option<VideoView>>,
    }

    #[glib::object_subclass]
    impl ObjectSubclass for RollcallWindow {
        const NAME: &'static str = "RollcallWindow";
        type Type = super::RollcallWindow;
        type ParentType = adw::ApplicationWindow;
    }

    impl ObjectImpl for RollcallWindow {
        fn constructed(&self) {
            self.parent_constructed();
            let obj = self.obj();
            obj.build_ui();
            obj.setup_quit_key();
        }
    }

    impl WidgetImpl for RollcallWindow {}

    impl WindowImpl for RollcallWindow {
        fn close_request(&self) -> glib::Propagation {
            if let Some(controller) = self.controller.borrow_mut().as_mut() {
                controller.stop();
            }
            self.parent_close_request()
        }
    }

    impl ApplicationWindowImpl for RollcallWindow {}
    impl AdwApplicationWindowImpl for RollcallWindow {}
}

glib::wrapper! {
    pub struct RollcallWindow(ObjectSubclass<imp::RollcallWindow>)
        @extends gtk::Widget, gtk::Window, gtk::ApplicationWindow, adw::ApplicationWindow,
        @implements gtk::Accessible, gtk::Buildable, gtk::ConstraintTarget,
                    gtk::Native, gtk::Root, gtk::ShortcutManager;
}

impl RollcallWindow {
    pub fn new(
        app: &RollcallApplication,
        controller: Option<RecognitionController>,
        quit_key: char,
    ) -> Self {
        let window: Self = glib::Object::builder()
            .property("application", app)
            .build();

        let imp = window.imp();
        *imp.controller.borrow_mut() = controller;
        imp.quit_key.set(quit_key);
        window
    }

    fn build_ui(&self) {
        let imp = self.imp();

        let toast_overlay = adw::ToastOverlay::new();
        let toolbar = adw::ToolbarView::new();
        let header = adw::HeaderBar::new();

        // Menu
        let menu_btn = gtk::MenuButton::builder()
            .icon_name("open-menu-symbolic")
            .build();
        let menu = gio::Menu::new();
        menu.append(Some("_About Rollcall"), Some("app.about"));
        menu.append(Some("_Quit"), Some("app.quit"));
        menu_btn.set_menu_model(Some(&menu));
        header.pack_end(&menu_btn);
        toolbar.add_top_bar(&header);

        let content_box = gtk::Box::builder()
            .orientation(gtk::Orientation::Horizontal)
            .spacing(12)
            .margin_top(12)
            .margin_bottom(12)
            .margin_start(12)
            .margin_end(12)
            .build();

        // === Control panel ===
        let panel = gtk::Box::builder()
            .orientation(gtk::Orientation::Vertical)
            .spacing(8)
            .width_request(240)
            .build();

        let btn_load = gtk::Button::builder()
            .label("Load ID Names")
            .css_classes(["pill"])
            .build();
        btn_load.connect_clicked(glib::clone!(
            #[weak(rename_to = window)] self,
            move |_| { window.choose_roster_file(); }
        ));

        let btn_start = gtk::Button::builder()
            .label("Start Recognition")
            .css_classes(["suggested-action", "pill"])
            .build();
        btn_start.connect_clicked(glib::clone!(
            #[weak(rename_to = window)] self,
            move |_| { window.start_recognition(); }
        ));

        let btn_stop = gtk::Button::builder()
            .label("Stop Recognition")
            .css_classes(["destructive-action", "pill"])
            .sensitive(false)
            .build();
        btn_stop.connect_clicked(glib::clone!(
            #[weak(rename_to = window)] self,
            move |_| { window.stop_recognition(); }
        ));

        let lbl_known = gtk::Label::builder()
            .label("Known Faces:")
            .xalign(0.0)
            .css_classes(["heading"])
            .margin_top(8)
            .build();

        let list_names = gtk::ListBox::builder()
            .selection_mode(gtk::SelectionMode::Single)
            .css_classes(["boxed-list", "known-faces"])
            .build();

        let list_scroll = gtk::ScrolledWindow::builder()
            .hscrollbar_policy(gtk::PolicyType::Never)
            .min_content_height(240)
            .vexpand(true)
            .child(&list_names)
            .build();

        let lbl_counter = gtk::Label::builder()
            .label(Counters::default().to_string())
            .xalign(0.0)
            .css_classes(["counter-label"])
            .build();

        let lbl_accuracy = gtk::Label::builder()
            .label("Accuracy: N/A")
            .xalign(0.0)
            .css_classes(["dim-label"])
            .build();

        panel.append(&btn_load);
        panel.append(&btn_start);
        panel.append(&btn_stop);
        panel.append(&lbl_known);
        panel.append(&list_scroll);
        panel.append(&lbl_counter);
        panel.append(&lbl_accuracy);

        // === Live video ===
        let video_view = VideoView::new();
        video_view.add_css_class("video-view");

        content_box.append(&panel);
        content_box.append(&video_view);

        toolbar.set_content(Some(&content_box));
        toast_overlay.set_child(Some(&toolbar));
        self.set_content(Some(&toast_overlay));

        // Store references
        *imp.toast_overlay.borrow_mut() = Some(toast_overlay);
        *imp.btn_load.borrow_mut() = Some(btn_load);
        *imp.btn_start.borrow_mut() = Some(btn_start);
        *imp.btn_stop.borrow_mut() = Some(btn_stop);
        *imp.list_names.borrow_mut() = Some(list_names);
        *imp.lbl_counter.borrow_mut() = Some(lbl_counter);
        *imp.lbl_accuracy.borrow_mut() = Some(lbl_accuracy);
        *imp.video_view.borrow_mut() = Some(video_view);

        self.set_title(Some("LBPH Face Recognition GUI"));
        self.set_default_size(980, 620);
    }

    fn setup_quit_key(&self) {
        let keys = gtk::EventControllerKey::new();
        keys.connect_key_pressed(glib::clone!(
            #[weak(rename_to = window)] self,
            #[upgrade_or] glib::Propagation::Proceed,
            move |_, key, _, _| {
                let quit_key = window.imp().quit_key.get();
                if key.to_unicode() == Some(quit_key) && window.is_running() {
                    info!("Quit key pressed");
                    window.stop_recognition();
                    return glib::Propagation::Stop;
                }
                glib::Propagation::Proceed
            }
        ));
        self.add_controller(keys);
    }

    fn is_running(&self) -> bool {
        self.imp().controller.borrow()
            .as_ref()
            .map(|c| c.state() == LoopState::Running)
            .unwrap_or(false)
    }

    // === Roster ===

    fn choose_roster_file(&self) {
        let filter = gtk::FileFilter::new();
        filter.set_name(Some("CSV Files"));
        filter.add_pattern("*.csv");

        let filters = gio::ListStore::new::<gtk::FileFilter>();
        filters.append(&filter);

        let dialog = gtk::FileDialog::builder()
            .title("Load ID Names")
            .modal(true)
            .filters(&filters)
            .default_filter(&filter)
            .build();

        dialog.open(Some(self), gio::Cancellable::NONE, glib::clone!(
            #[weak(rename_to = window)] self,
            move |result| {
                match result {
                    Ok(file) => match file.path() {
                        Some(path) => window.load_roster(&path),
                        None => window.show_toast("Only local files can be loaded"),
                    },
                    Err(e) => debug!("Roster file dialog dismissed: {}", e),
                }
            }
        ));
    }

    fn load_roster(&self, path: &Path) {
        let roster = match Roster::load(path)
            .with_context(|| format!("Could not load {}", path.display()))
        {
            Ok(roster) => Arc::new(roster),
            Err(e) => {
                warn!("{:#}", e);
                // The previous roster, if any, stays in place
                self.show_message_dialog("Error", &format!("{:#}", e));
                return;
            }
        };

        let imp = self.imp();
        if let Some(ref list) = *imp.list_names.borrow() {
            list.remove_all();
            for name in roster.names() {
                let row = gtk::Label::builder()
                    .label(name)
                    .xalign(0.0)
                    .margin_top(4)
                    .margin_bottom(4)
                    .margin_start(8)
                    .margin_end(8)
                    .build();
                list.append(&row);
            }
        }

        self.set_counters(Counters::new(roster.len(), 0));
        *imp.roster.borrow_mut() = Some(roster);

        if self.is_running() {
            self.show_toast("The new roster applies from the next start");
        }
        self.show_message_dialog("Success", "ID names loaded successfully!");
    }

    // === Recognition ===

    fn start_recognition(&self) {
        let imp = self.imp();

        let roster = imp.roster.borrow().clone();
        let Some(roster) = roster else {
            self.show_message_dialog("Error", ROSTER_NOT_LOADED);
            return;
        };

        let result = match imp.controller.borrow_mut().as_mut() {
            Some(controller) => controller.start(roster.clone()),
            None => {
                self.show_message_dialog("Error", "Face recognition is not available");
                return;
            }
        };

        let rx = match result {
            Ok(rx) => rx,
            Err(RollcallError::RosterNotLoaded) => {
                self.show_message_dialog("Error", ROSTER_NOT_LOADED);
                return;
            }
            Err(e) => {
                self.show_message_dialog("Error", &e.to_string());
                return;
            }
        };

        let generation = imp.generation.get() + 1;
        imp.generation.set(generation);

        self.set_running_ui(true);
        self.set_highlights(&BTreeSet::new(), true);
        self.set_counters(Counters::new(roster.len(), 0));
        if let Some(ref lbl) = *imp.lbl_accuracy.borrow() {
            lbl.set_label("Accuracy: N/A");
        }

        // Apply loop events on the main thread
        glib::spawn_future_local(glib::clone!(
            #[weak(rename_to = window)] self,
            async move {
                while let Ok(event) = rx.recv().await {
                    if window.imp().generation.get() != generation {
                        break;
                    }
                    match event {
                        LoopEvent::Frame(report) => window.apply_report(report),
                        LoopEvent::Finished(reason) => {
                            window.on_loop_finished(reason);
                            break;
                        }
                    }
                }
            }
        ));
    }

    fn stop_recognition(&self) {
        let imp = self.imp();

        let stopped = imp.controller.borrow_mut()
            .as_mut()
            .map(|c| c.stop())
            .unwrap_or(false);
        if !stopped {
            return;
        }

        imp.generation.set(imp.generation.get() + 1);
        self.set_running_ui(false);
        if let Some(ref view) = *imp.video_view.borrow() {
            view.clear();
        }
    }

    fn apply_report(&self, report: FrameReport) {
        let imp = self.imp();

        if let Some(ref view) = *imp.video_view.borrow() {
            view.set_frame(&report.frame, report.annotations);
        }

        self.set_highlights(&report.recognized, false);
        self.set_counters(report.counters);

        if let Some(accuracy) = report.accuracy {
            if let Some(ref lbl) = *imp.lbl_accuracy.borrow() {
                lbl.set_label(&format!("Accuracy: {:.2}%", accuracy));
            }
        }
    }

    fn on_loop_finished(&self, reason: StopReason) {
        let imp = self.imp();

        if let Some(controller) = imp.controller.borrow_mut().as_mut() {
            controller.stop();
        }
        self.set_running_ui(false);
        if let Some(ref view) = *imp.video_view.borrow() {
            view.clear();
        }

        match reason {
            StopReason::Failed(message) => {
                self.show_message_dialog("Recognition stopped", &message);
            }
            StopReason::Requested | StopReason::Disconnected => {}
        }
    }

    // === UI helpers ===

    fn set_running_ui(&self, running: bool) {
        let imp = self.imp();
        if let Some(ref btn) = *imp.btn_start.borrow() {
            btn.set_sensitive(!running);
        }
        if let Some(ref btn) = *imp.btn_stop.borrow() {
            btn.set_sensitive(running);
        }
    }

    fn set_counters(&self, counters: Counters) {
        if let Some(ref lbl) = *self.imp().lbl_counter.borrow() {
            lbl.set_label(&counters.to_string());
        }
    }

    /// Highlights every row whose name is in `recognized`; `reset` also clears the others.
    fn set_highlights(&self, recognized: &BTreeSet<String>, reset: bool) {
        let imp = self.imp();
        let Some(ref list) = *imp.list_names.borrow() else {
            return;
        };

        let mut index = 0;
        while let Some(row) = list.row_at_index(index) {
            index += 1;
            let Some(label) = row.child().and_downcast::<gtk::Label>() else {
                continue;
            };
            if recognized.contains(label.text().as_str()) {
                row.add_css_class("recognized");
            } else if reset {
                row.remove_css_class("recognized");
            }
        }
    }

    fn show_message_dialog(&self, heading: &str, body: &str) {
        let dialog = adw::MessageDialog::builder()
            .heading(heading)
            .body(body)
            .modal(true)
            .transient_for(self)
            .build();

        dialog.add_response("ok", "OK");
        dialog.set_default_response(Some("ok"));
        dialog.set_close_response("ok");
        dialog.present();
    }

    fn show_toast(&self, message: &str) {
        let imp = self.imp();
        if let Some(ref overlay) = *imp.toast_overlay.borrow() {
            overlay.add_toast(adw::Toast::new(message));
        }
    }
}
