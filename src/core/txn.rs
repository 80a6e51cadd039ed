use chrono::{DateTime, SecondsFormat, Utc};
use rusty_money::{iso, Money};
use serde::{Deserialize, Serialize};

const UNKNOWN_PAYEE: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Merchant {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// A transaction as reported by the bank. Amounts are signed minor units,
/// negative for money leaving the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankTransaction {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub description: String,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub merchant: Option<Merchant>,
    /// Settlement timestamp, empty or absent while the transaction is pending.
    #[serde(default)]
    pub settled: Option<String>,
    #[serde(default)]
    pub decline_reason: Option<String>,
}

impl BankTransaction {
    pub fn payee(&self) -> &str {
        self.merchant
            .as_ref()
            .and_then(|m| m.name.as_deref())
            .filter(|name| !name.is_empty())
            .or_else(|| Some(self.description.as_str()).filter(|d| !d.is_empty()))
            .unwrap_or(UNKNOWN_PAYEE)
    }

    /// Merchant category with its emoji when the bank supplies one, e.g.
    /// `"🍔 eating_out"`.
    pub fn category_label(&self) -> Option<String> {
        let merchant = self.merchant.as_ref()?;
        let category = merchant.category.as_deref().filter(|c| !c.is_empty())?;

        match merchant.emoji.as_deref().filter(|e| !e.is_empty()) {
            Some(emoji) => Some(format!("{} {}", emoji, category)),
            None => Some(category.to_string()),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.settled.as_deref().map_or(true, str::is_empty)
    }

    pub fn is_declined(&self) -> bool {
        self.decline_reason.is_some()
    }

    pub fn display_amount(&self) -> String {
        match iso::find(&self.currency) {
            Some(currency) => Money::from_minor(self.amount, currency).to_string(),
            None => format!("{:.2} {}", self.amount as f64 / 100.0, self.currency),
        }
    }

    /// Projects the bank transaction onto the ledger's shape. The ledger counts
    /// spending as positive, so the sign is flipped.
    pub fn to_ledger(&self, bank_account_id: &str) -> LedgerTransaction {
        let payee = self.payee().to_string();

        LedgerTransaction {
            bank_account_id: bank_account_id.to_string(),
            amount: -self.amount,
            name: payee.clone(),
            merchant_name: payee,
            date: self.created.to_rfc3339_opts(SecondsFormat::Millis, true),
            is_pending: self.is_pending(),
            spending_id: None,
            adjusts_balance: true,
        }
    }
}

/// Payload accepted by the ledger's create transaction endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerTransaction {
    pub bank_account_id: String,
    pub amount: i64,
    pub name: String,
    pub merchant_name: String,
    pub date: String,
    pub is_pending: bool,
    pub spending_id: Option<String>,
    pub adjusts_balance: bool,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn bank_txn() -> BankTransaction {
        BankTransaction {
            id: "tx_0000A".to_string(),
            amount: -1250,
            currency: "GBP".to_string(),
            description: "PRET A MANGER LONDON".to_string(),
            created: Utc.with_ymd_and_hms(2024, 3, 9, 12, 30, 5).unwrap(),
            merchant: Some(Merchant {
                name: Some("Pret A Manger".to_string()),
                emoji: None,
                category: Some("eating_out".to_string()),
            }),
            settled: Some("2024-03-10T02:00:00.000Z".to_string()),
            decline_reason: None,
        }
    }

    #[test]
    fn maps_spending_to_positive_ledger_amount() {
        let out = bank_txn().to_ledger("bac_01");

        assert_eq!(
            out,
            LedgerTransaction {
                bank_account_id: "bac_01".to_string(),
                amount: 1250,
                name: "Pret A Manger".to_string(),
                merchant_name: "Pret A Manger".to_string(),
                date: "2024-03-09T12:30:05.000Z".to_string(),
                is_pending: false,
                spending_id: None,
                adjusts_balance: true,
            }
        );
    }

    #[test]
    fn maps_income_to_negative_ledger_amount() {
        let txn = BankTransaction {
            amount: 250000,
            merchant: None,
            description: "SALARY".to_string(),
            ..bank_txn()
        };

        let out = txn.to_ledger("bac_01");

        assert_eq!(out.amount, -250000);
        assert_eq!(out.name, "SALARY");
    }

    #[test]
    fn category_label_prefers_emoji() {
        assert_eq!(bank_txn().category_label().as_deref(), Some("eating_out"));

        let with_emoji = BankTransaction {
            merchant: Some(Merchant {
                emoji: Some("🍔".to_string()),
                ..bank_txn().merchant.unwrap()
            }),
            ..bank_txn()
        };
        assert_eq!(with_emoji.category_label().as_deref(), Some("🍔 eating_out"));

        let uncategorized = BankTransaction {
            merchant: Some(Merchant {
                name: Some("Pret A Manger".to_string()),
                emoji: Some("🍔".to_string()),
                category: Some("".to_string()),
            }),
            ..bank_txn()
        };
        assert_eq!(uncategorized.category_label(), None);
        assert_eq!(BankTransaction { merchant: None, ..bank_txn() }.category_label(), None);
    }

    #[test]
    fn payee_falls_back_to_description_then_unknown() {
        let unnamed = BankTransaction {
            merchant: Some(Merchant {
                name: Some("".to_string()),
                emoji: None,
                category: None,
            }),
            ..bank_txn()
        };
        assert_eq!(unnamed.payee(), "PRET A MANGER LONDON");

        let blank = BankTransaction {
            merchant: None,
            description: "".to_string(),
            ..bank_txn()
        };
        assert_eq!(blank.payee(), "Unknown");
    }

    #[test]
    fn unsettled_transactions_are_pending() {
        for settled in [None, Some("".to_string())] {
            let txn = BankTransaction {
                settled,
                ..bank_txn()
            };
            assert!(txn.is_pending());
            assert!(txn.to_ledger("bac_01").is_pending);
        }
    }

    #[test]
    fn decodes_bank_payload() {
        let raw = r#"{
            "id": "tx_00009",
            "amount": -510,
            "currency": "GBP",
            "created": "2024-03-09T08:01:02.123Z",
            "description": "TFL TRAVEL",
            "merchant": null,
            "settled": "",
            "category": "transport"
        }"#;

        let txn: BankTransaction = serde_json::from_str(raw).unwrap();

        assert_eq!(txn.amount, -510);
        assert!(txn.is_pending());
        assert!(!txn.is_declined());
        assert_eq!(txn.payee(), "TFL TRAVEL");
    }

    #[test]
    fn ledger_payload_uses_camel_case() {
        let json = serde_json::to_value(bank_txn().to_ledger("bac_01")).unwrap();

        assert_eq!(json["bankAccountId"], "bac_01");
        assert_eq!(json["isPending"], false);
        assert!(json["spendingId"].is_null());
        assert_eq!(json["adjustsBalance"], true);
    }
}
