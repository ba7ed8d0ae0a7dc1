pub trait WorkQueue {
    fn send_message(&self, body: &str) -> Result<(), String>;
}

impl<F> WorkQueue for F
where
    F: Fn(&str) -> Result<(), String>,
{
    fn send_message(&self, body: &str) -> Result<(), String> {
        self(body)
    }
}
