/// Output port for audit events. Fire-and-forget: implementations must not
/// block or fail the mutation that produced the event.
pub trait EventPublisher<E>: Send + Sync + 'static {
    fn publish(&self, event: &E);
}
