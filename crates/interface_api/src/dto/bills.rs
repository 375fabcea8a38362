//! Bill DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{BillId, BillItemId, Currency, ParticipantId, ReceiptId, SplitId, TempItemId, TripId, UserId};
use domain_bills::{
    Bill, BillItem, BillRecord, BillSummary, BillTotals, ConfirmBillRequest, ItemPricing,
    ParsedReceipt, Participant, PricedItem, Recomputation, ReceiptUpload, Split,
};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBillRequest {
    pub trip_id: TripId,
    #[validate(length(min = 1, max = 200, message = "title must be between 1 and 200 characters"))]
    pub title: String,
    /// Defaults to the caller
    pub paid_by_id: Option<UserId>,
    pub currency: Option<Currency>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TotalsResponse {
    pub currency: Currency,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub tax_percentage: Decimal,
    pub total_discount: Decimal,
    pub rounding: Decimal,
    pub total_amount: Decimal,
}

impl From<&BillTotals> for TotalsResponse {
    fn from(totals: &BillTotals) -> Self {
        Self {
            currency: totals.total_amount.currency(),
            subtotal: totals.subtotal.amount(),
            tax: totals.tax.amount(),
            tax_percentage: totals.tax_percentage,
            total_discount: totals.total_discount.amount(),
            rounding: totals.rounding.amount(),
            total_amount: totals.total_amount.amount(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillResponse {
    pub id: BillId,
    pub trip_id: TripId,
    pub title: String,
    pub merchant_name: Option<String>,
    pub paid_by_id: UserId,
    #[serde(flatten)]
    pub totals: TotalsResponse,
    pub created_at: DateTime<Utc>,
}

impl From<&Bill> for BillResponse {
    fn from(bill: &Bill) -> Self {
        Self {
            id: bill.id,
            trip_id: bill.trip_id,
            title: bill.title.clone(),
            merchant_name: bill.merchant_name.clone(),
            paid_by_id: bill.paid_by,
            totals: TotalsResponse::from(&bill.totals),
            created_at: bill.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillItemResponse {
    pub id: BillItemId,
    pub temp_item_id: TempItemId,
    pub name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total_price: Decimal,
    pub description: Option<String>,
}

impl From<&BillItem> for BillItemResponse {
    fn from(item: &BillItem) -> Self {
        Self {
            id: item.id,
            temp_item_id: item.temp_item_id.clone(),
            name: item.name.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price.amount(),
            discount: item.discount.amount(),
            tax: item.tax.amount(),
            total_price: item.total_price.amount(),
            description: item.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantResponse {
    pub id: ParticipantId,
    pub user_id: Option<UserId>,
    pub display_name: String,
}

impl From<&Participant> for ParticipantResponse {
    fn from(p: &Participant) -> Self {
        Self {
            id: p.id,
            user_id: p.user_id,
            display_name: p.display_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitResponse {
    pub id: SplitId,
    pub bill_item_id: BillItemId,
    pub user_id: UserId,
    pub amount: Decimal,
}

impl From<&Split> for SplitResponse {
    fn from(s: &Split) -> Self {
        Self {
            id: s.id,
            bill_item_id: s.bill_item_id,
            user_id: s.user_id,
            amount: s.amount.amount(),
        }
    }
}

/// A bill with everything hanging off it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillDetailResponse {
    #[serde(flatten)]
    pub bill: BillResponse,
    pub items: Vec<BillItemResponse>,
    pub participants: Vec<ParticipantResponse>,
    pub splits: Vec<SplitResponse>,
}

impl From<&BillRecord> for BillDetailResponse {
    fn from(record: &BillRecord) -> Self {
        Self {
            bill: BillResponse::from(&record.bill),
            items: record.items.iter().map(BillItemResponse::from).collect(),
            participants: record.participants.iter().map(ParticipantResponse::from).collect(),
            splits: record.splits.iter().map(SplitResponse::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillSummaryResponse {
    pub id: BillId,
    pub title: String,
    pub merchant_name: Option<String>,
    pub currency: Currency,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<&BillSummary> for BillSummaryResponse {
    fn from(summary: &BillSummary) -> Self {
        Self {
            id: summary.id,
            title: summary.title.clone(),
            merchant_name: summary.merchant_name.clone(),
            currency: summary.total_amount.currency(),
            total_amount: summary.total_amount.amount(),
            created_at: summary.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmBillResponse {
    pub bill_id: BillId,
}

/// An editable bill in the exact shape the confirm endpoint accepts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftResponse {
    pub bill_id: BillId,
    pub currency: Currency,
    pub draft: ConfirmBillRequest,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AttachReceiptRequest {
    #[validate(url(message = "imageUrl must be a URL"))]
    pub image_url: Option<String>,
    pub raw_ocr_text: Option<String>,
    pub parsed: ParsedReceipt,
}

impl From<AttachReceiptRequest> for ReceiptUpload {
    fn from(request: AttachReceiptRequest) -> Self {
        Self {
            image_url: request.image_url,
            raw_ocr_text: request.raw_ocr_text,
            parsed: request.parsed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachReceiptResponse {
    pub receipt_id: ReceiptId,
    #[serde(flatten)]
    pub draft: DraftResponse,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecomputeItem {
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    /// Manual tax replacing the rate-derived tax
    #[serde(default)]
    pub tax: Option<Decimal>,
}

impl From<&RecomputeItem> for ItemPricing {
    fn from(item: &RecomputeItem) -> Self {
        let pricing = ItemPricing::new(item.quantity, item.unit_price).with_discount(item.discount);
        match item.tax {
            Some(tax) => pricing.with_tax_override(tax),
            None => pricing,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecomputeRequest {
    #[validate(length(max = 500, message = "at most 500 items"))]
    pub items: Vec<RecomputeItem>,
    #[serde(default)]
    pub tax_percentage: Decimal,
    #[serde(default)]
    pub rounding: Decimal,
    /// Defaults to the server's default currency
    pub currency: Option<Currency>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedItemResponse {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total_price: Decimal,
}

impl From<&PricedItem> for PricedItemResponse {
    fn from(item: &PricedItem) -> Self {
        Self {
            subtotal: item.raw_subtotal,
            discount: item.discount.amount(),
            tax: item.tax.amount(),
            total_price: item.total_price.amount(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecomputeResponse {
    pub items: Vec<PricedItemResponse>,
    pub totals: TotalsResponse,
}

impl From<&Recomputation> for RecomputeResponse {
    fn from(result: &Recomputation) -> Self {
        Self {
            items: result.items.iter().map(PricedItemResponse::from).collect(),
            totals: TotalsResponse::from(&result.totals),
        }
    }
}
