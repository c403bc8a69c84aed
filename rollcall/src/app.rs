use gtk4 as gtk;
use libadwaita as adw;

use adw::prelude::*;
use adw::subclass::prelude::*;
use gtk::gio;
use gtk::glib;

use std::cell::RefCell;

use rollcall_core::{RecognitionController, RollcallConfig};

use crate::window::RollcallWindow;

mod imp {
    use super::*;

    #[derive(Debug, Default)]
    pub struct RollcallApplication {
        pub config: RefCell<RollcallConfig>,
        pub controller: RefCell<Option<RecognitionController>>,
    }

    #[glib::object_subclass]
    impl ObjectSubclass for RollcallApplication {
        const NAME: &'static str = "RollcallApplication";
        type Type = super::RollcallApplication;
        type ParentType = adw::Application;
    }

    impl ObjectImpl for RollcallApplication {
        fn constructed(&self) {
            self.parent_constructed();
            let obj = self.obj();
            obj.setup_actions();
        }
    }

    impl ApplicationImpl for RollcallApplication {
        fn startup(&self) {
            self.parent_startup();
            self.obj().load_css();
        }

        fn activate(&self) {
            let obj = self.obj();
            if let Some(window) = obj.active_window() {
                window.present();
                return;
            }

            let quit_key = self.config.borrow().ui.quit_key;
            let window = RollcallWindow::new(&obj, self.controller.borrow_mut().take(), quit_key);
            window.present();
        }
    }

    impl GtkApplicationImpl for RollcallApplication {}
    impl AdwApplicationImpl for RollcallApplication {}
}

glib::wrapper! {
    pub struct RollcallApplication(ObjectSubclass<imp::RollcallApplication>)
        @extends gio::Application, gtk::Application, adw::Application,
        @implements gio::ActionGroup, gio::ActionMap;
}

impl RollcallApplication {
    pub fn new(config: RollcallConfig, controller: RecognitionController) -> Self {
        let app: Self = glib::Object::builder()
            .property("application-id", "io.github.rollcall.Rollcall")
            .property("flags", gio::ApplicationFlags::FLAGS_NONE)
            .build();

        let imp = app.imp();
        *imp.config.borrow_mut() = config;
        *imp.controller.borrow_mut() = Some(controller);
        app
    }

    fn setup_actions(&self) {
        let about_action = gio::ActionEntry::builder("about")
            .activate(|app: &Self, _, _| app.show_about())
            .build();

        let quit_action = gio::ActionEntry::builder("quit")
            .activate(|app: &Self, _, _| app.quit())
            .build();

        self.add_action_entries([about_action, quit_action]);
        self.set_accels_for_action("app.quit", &["<Ctrl>q"]);
    }

    fn load_css(&self) {
        let css = r#"
            .video-view {
                background-color: @card_bg_color;
                border-radius: 12px;
            }
            .known-faces row.recognized {
                background-color: lightgreen;
                color: black;
            }
            .counter-label { font-weight: bold; }
        "#;

        let provider = gtk::CssProvider::new();
        provider.load_from_string(css);

        if let Some(display) = gtk::gdk::Display::default() {
            gtk::style_context_add_provider_for_display(
                &display, &provider, gtk::STYLE_PROVIDER_PRIORITY_APPLICATION,
            );
        }
    }

    fn show_about(&self) {
        let window = self.active_window();

        let dialog = adw::AboutWindow::builder()
            .application_name("Rollcall")
            .application_icon("camera-web-symbolic")
            .developer_name("Rollcall Team")
            .version(env!("CARGO_PKG_VERSION"))
            .license_type(gtk::License::Gpl30)
            .comments("Live LBPH face recognition against a CSV roster")
            .modal(true)
            .build();

        if let Some(win) = window {
            dialog.set_transient_for(Some(&win));
        }
        dialog.present();
    }
}
