pub trait AlertSink {
    fn notify(&self, message: &str) -> Result<(), String>;
}
