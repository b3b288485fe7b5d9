fn main() {
    folio::config::load_dotenv();
    folio::config::init_tracing();
    dioxus::launch(folio::widget::App);
}
