use std::{fmt::Write as _, sync::Arc};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::{
    config::{AppConfig, MailConfig},
    dto::orders::OrderWithItems,
    models::{Order, OrderItem},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail API responded with status {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

/// Delivers through a transactional-email HTTP API (`POST {endpoint}` with a JSON body).
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    from: String,
}

impl HttpMailer {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, from: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
            from: from.into(),
        }
    }
}

#[derive(Serialize)]
struct OutboundEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let body = OutboundEmail {
            from: &self.from,
            to: [&message.to],
            subject: &message.subject,
            html: &message.html,
            text: &message.text,
        };
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(MailError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Writes messages to the log instead of delivering them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        tracing::info!(to = %message.to, subject = %message.subject, "email (log transport)");
        Ok(())
    }
}

/// Builds and sends order emails. Delivery problems are logged and never
/// returned: an order or status change must not depend on mail delivery.
#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    store_name: String,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, store_name: impl Into<String>) -> Self {
        Self {
            mailer,
            store_name: store_name.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(mailer_from_config(&config.mail), config.store_name.clone())
    }

    pub async fn order_confirmation(&self, order: &OrderWithItems, email: &str, name: &str) {
        let message = confirmation_email(&self.store_name, order, email, name);
        self.deliver("order_confirmation", &order.order, message).await;
    }

    /// `items` are the lines belonging to this seller only.
    pub async fn seller_new_order(
        &self,
        order: &Order,
        items: &[OrderItem],
        email: &str,
        name: &str,
    ) {
        let message = seller_alert_email(&self.store_name, order, items, email, name);
        self.deliver("seller_new_order", order, message).await;
    }

    pub async fn status_update(&self, order: &Order, email: &str, name: &str) {
        let message = status_update_email(&self.store_name, order, email, name);
        self.deliver("order_status_update", order, message).await;
    }

    async fn deliver(&self, kind: &str, order: &Order, message: EmailMessage) {
        match self.mailer.send(&message).await {
            Ok(()) => tracing::debug!(kind, order_number = %order.order_number, "email sent"),
            Err(err) => tracing::warn!(
                kind,
                order_number = %order.order_number,
                error = %err,
                "email delivery failed"
            ),
        }
    }
}

fn mailer_from_config(mail: &MailConfig) -> Arc<dyn Mailer> {
    match &mail.api_url {
        Some(url) => Arc::new(HttpMailer::new(url, mail.api_key.clone(), &mail.from)),
        None => Arc::new(LogMailer),
    }
}

pub fn confirmation_email(
    store: &str,
    order: &OrderWithItems,
    email: &str,
    name: &str,
) -> EmailMessage {
    let o = &order.order;
    let mut text = format!(
        "Hi {name},\n\nThank you for your order {} at {store}.\n\n",
        o.order_number
    );
    push_item_lines(&mut text, &order.items);
    let _ = write!(
        text,
        "\nSubtotal: {}\nDiscount: {}\nShipping: {}\nTax: {}\nTotal: {}\n\nShipping to: {}\n",
        o.subtotal, o.discount_amount, o.shipping_cost, o.tax, o.total, o.shipping_address
    );

    EmailMessage {
        to: email.to_string(),
        subject: format!("Order confirmation {}", o.order_number),
        html: wrap_html(store, &text),
        text,
    }
}

pub fn seller_alert_email(
    store: &str,
    order: &Order,
    items: &[OrderItem],
    email: &str,
    name: &str,
) -> EmailMessage {
    let mut text = format!("Hi {name},\n\nNew order {} includes your products:\n\n", order.order_number);
    push_item_lines(&mut text, items);
    let _ = write!(
        text,
        "\nPayment method: {}\nShip to: {}\n",
        order.payment_method, order.shipping_address
    );
    if let Some(notes) = &order.notes {
        let _ = writeln!(text, "Notes: {notes}");
    }

    EmailMessage {
        to: email.to_string(),
        subject: format!("New order {}", order.order_number),
        html: wrap_html(store, &text),
        text,
    }
}

pub fn status_update_email(store: &str, order: &Order, email: &str, name: &str) -> EmailMessage {
    let mut text = format!(
        "Hi {name},\n\nYour order {} is now {}.\n",
        order.order_number,
        order.status.label()
    );
    if let Some(tracking) = &order.tracking_number {
        let _ = writeln!(text, "Tracking number: {tracking}");
    }

    EmailMessage {
        to: email.to_string(),
        subject: format!("Order {} {}", order.order_number, order.status.label().to_lowercase()),
        html: wrap_html(store, &text),
        text,
    }
}

fn push_item_lines(text: &mut String, items: &[OrderItem]) {
    for item in items {
        let name = item.product_name.as_deref().unwrap_or("Item");
        let _ = writeln!(text, "- {name} x{} @ {} = {}", item.quantity, item.price, item.line_total());
    }
}

fn wrap_html(store: &str, text: &str) -> String {
    let mut html = format!("<h2>{}</h2>", escape_html(store));
    for line in text.lines() {
        let _ = write!(html, "<p>{}</p>", escape_html(line));
    }
    html
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::orders::{OrderStatus, PaymentStatus};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;
    use uuid::Uuid;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path},
    };

    fn order() -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            order_number: "ORD-20261015-1A2B3C4D".into(),
            user_id: Uuid::new_v4(),
            status: OrderStatus::Shipped,
            payment_status: PaymentStatus::Pending,
            subtotal: dec!(2499.99),
            discount_amount: dec!(250.00),
            voucher_code: Some("SAVE10".into()),
            shipping_cost: dec!(0),
            tax: dec!(0),
            total: dec!(2249.99),
            shipping_address: "1 <Main> St".into(),
            billing_address: None,
            payment_method: "card".into(),
            tracking_number: Some("TRK123".into()),
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn with_items() -> OrderWithItems {
        let order = order();
        let items = vec![OrderItem {
            id: Uuid::new_v4(),
            order_id: order.id,
            product_id: Uuid::new_v4(),
            product_name: Some("Sapphire Pendant".into()),
            quantity: 1,
            price: dec!(2499.99),
            created_at: Utc::now(),
        }];
        OrderWithItems { order, items }
    }

    #[derive(Default)]
    struct Recording(Mutex<Vec<EmailMessage>>);

    #[async_trait]
    impl Mailer for Recording {
        async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
            self.0.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Mailer for Failing {
        async fn send(&self, _message: &EmailMessage) -> Result<(), MailError> {
            Err(MailError::Rejected(503))
        }
    }

    #[test]
    fn confirmation_lists_items_and_totals() {
        let msg = confirmation_email("Gem House", &with_items(), "ana@example.com", "Ana");
        assert_eq!(msg.to, "ana@example.com");
        assert_eq!(msg.subject, "Order confirmation ORD-20261015-1A2B3C4D");
        assert!(msg.text.contains("Sapphire Pendant x1 @ 2499.99"));
        assert!(msg.text.contains("Total: 2249.99"));
        assert!(msg.html.contains("1 &lt;Main&gt; St"));
    }

    #[test]
    fn status_update_mentions_tracking_number() {
        let msg = status_update_email("Gem House", &order(), "ana@example.com", "Ana");
        assert!(msg.text.contains("is now Shipped"));
        assert!(msg.text.contains("Tracking number: TRK123"));
        assert_eq!(msg.subject, "Order ORD-20261015-1A2B3C4D shipped");
    }

    #[tokio::test]
    async fn notifier_sends_through_mailer() {
        let mailer = Arc::new(Recording::default());
        let notifier = Notifier::new(mailer.clone(), "Gem House");
        let order = with_items();
        notifier.order_confirmation(&order, "ana@example.com", "Ana").await;
        notifier
            .seller_new_order(&order.order, &order.items, "seller@example.com", "Sol")
            .await;
        let sent = mailer.0.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].to, "seller@example.com");
    }

    #[tokio::test]
    async fn delivery_failures_are_swallowed() {
        let notifier = Notifier::new(Arc::new(Failing), "Gem House");
        notifier.status_update(&order(), "ana@example.com", "Ana").await;
    }

    #[tokio::test]
    async fn http_mailer_posts_json_with_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("authorization", "Bearer key-123"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mailer = HttpMailer::new(
            format!("{}/emails", server.uri()),
            Some("key-123".into()),
            "orders@gemhouse.test",
        );
        let msg = status_update_email("Gem House", &order(), "ana@example.com", "Ana");
        mailer.send(&msg).await.unwrap();
    }

    #[tokio::test]
    async fn http_mailer_reports_rejections() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422))
            .mount(&server)
            .await;

        let mailer = HttpMailer::new(server.uri(), None, "orders@gemhouse.test");
        let msg = status_update_email("Gem House", &order(), "ana@example.com", "Ana");
        assert!(matches!(mailer.send(&msg).await, Err(MailError::Rejected(422))));
    }
}
