pub trait RecordSink {
    fn put_record(&self, data: &[u8]) -> Result<(), String>;
}
