use serde_json::Value;

/// The terminal state a pending payment reaches once its gateway call has resolved.
#[derive(Debug, Clone)]
pub enum PaymentFinalization {
    /// The gateway approved the payment. The order moves to `paid`.
    Completed { transaction_id: String, response: Value },
    /// The gateway declined the payment, or the adapter failed outright (in which case there is
    /// no response document). The order moves to `canceled`.
    Failed { response: Option<Value> },
}
