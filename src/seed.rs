//! Demo data loaded when the service starts without a snapshot and
//! `seed_demo_data` is enabled.

use crate::model::{
    GatePass, GatePassItem, GatePassStatus, GatePassType, Item, Requester, VehicleInfo,
};
use chrono::{DateTime, Datelike, Duration, Utc};

pub const UNITS: &[&str] = &["Pcs", "Kg", "Bag", "Pack", "Ltr", "Set", "Box"];

const ITEMS: &[(&str, &str, &str, &str, &str, &str, i64)] = &[
    ("i1", "Laptop HP Probook", "ITM-001", "IT Equipment", "Pcs", "IT", 1),
    ("i2", "Electric Motor 5HP", "EQP-002", "Machinery", "Pcs", "Maintenance", 1),
    ("i3", "Seed Bag (50kg)", "RAW-003", "Raw Material", "Bag", "Production", 50),
    ("i4", "Fertilizer Pack", "AGR-004", "Agro Supplies", "Pack", "Farming", 0),
    ("i5", "Welding Machine", "EQP-005", "Tools", "Pcs", "Workshop", 0),
    ("i6", "Desktop Computer Dell", "ITM-006", "IT Equipment", "Pcs", "Accounts", 0),
];

const REQUESTERS: &[(&str, &str, &str, &str)] = &[
    ("r1", "A. R. Khan", "Management", "Executive"),
    ("r2", "E. Haque", "Management", "Accounts"),
    ("r3", "B. Islam", "Factory Employee", "Maintenance"),
    ("r4", "C. Ahmed", "Factory Employee", "Production"),
    ("r5", "D. Chowdhury", "Factory Employee", "Farming"),
    ("r6", "Mostafizur Rahman", "Factory Employee", "IT"),
    ("r7", "Salma Akter", "Factory Employee", "HR"),
    ("r8", "Prime Contractors Ltd.", "Contractor", "Civil"),
    ("r9", "John Smith (Auditor)", "Visitor", "Audit"),
];

const HEAD: &str = "John Doe (Head)";
const GUARD: &str = "Security Guard";

pub fn items() -> Vec<Item> {
    ITEMS
        .iter()
        .map(|&(id, name, code, category, unit, department, stock)| Item {
            id: id.to_string(),
            name: name.to_string(),
            code: code.to_string(),
            category: category.to_string(),
            unit: unit.to_string(),
            department: department.to_string(),
            stock,
        })
        .collect()
}

pub fn requesters() -> Vec<Requester> {
    REQUESTERS
        .iter()
        .map(|&(id, name, category, department)| Requester {
            id: id.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            department: Some(department.to_string()),
        })
        .collect()
}

struct SeedPass {
    seq: u32,
    department: &'static str,
    requester: &'static str,
    category: &'static str,
    purpose: &'static str,
    driver: &'static str,
    plate: &'static str,
    item: (&'static str, i64, &'static str, &'static str),
    pass_type: GatePassType,
    status: GatePassStatus,
    created_days: i64,
    due_days: Option<i64>,
    returned_days: Option<i64>,
    delivered_by: Option<&'static str>,
    returned_by: Option<&'static str>,
    photo_url: Option<&'static str>,
}

const PASSES: &[SeedPass] = &[
    SeedPass {
        seq: 1,
        department: "IT",
        requester: "A. R. Khan",
        category: "Management",
        purpose: "Repair",
        driver: "Karim Mia",
        plate: "DH-GA-12-3456",
        item: ("i1", 1, "Pcs", "Screen flickering issue"),
        pass_type: GatePassType::Returnable,
        status: GatePassStatus::Overdue,
        created_days: -5,
        due_days: Some(-3),
        returned_days: None,
        delivered_by: None,
        returned_by: None,
        photo_url: Some("https://picsum.photos/400/300"),
    },
    SeedPass {
        seq: 2,
        department: "Maintenance",
        requester: "B. Islam",
        category: "Factory Employee",
        purpose: "External Servicing",
        driver: "Rahim Sheikh",
        plate: "CH-KA-45-7890",
        item: ("i2", 1, "Pcs", "Bearing change needed"),
        pass_type: GatePassType::Returnable,
        status: GatePassStatus::Delivered,
        created_days: -1,
        due_days: Some(1),
        returned_days: None,
        delivered_by: Some(GUARD),
        returned_by: None,
        photo_url: None,
    },
    SeedPass {
        seq: 3,
        department: "Production",
        requester: "C. Ahmed",
        category: "Factory Employee",
        purpose: "Delivery to Client",
        driver: "Jamal Uddin",
        plate: "SY-DA-11-2233",
        item: ("i3", 50, "Bag", "Order #C-554"),
        pass_type: GatePassType::NonReturnable,
        status: GatePassStatus::Delivered,
        created_days: 0,
        due_days: None,
        returned_days: None,
        delivered_by: Some(GUARD),
        returned_by: None,
        photo_url: None,
    },
    SeedPass {
        seq: 4,
        department: "Farming",
        requester: "D. Chowdhury",
        category: "Factory Employee",
        purpose: "Field Application",
        driver: "N/A",
        plate: "N/A",
        item: ("i4", 10, "Pack", "For sector B"),
        pass_type: GatePassType::NonReturnable,
        status: GatePassStatus::Approved,
        created_days: 0,
        due_days: None,
        returned_days: None,
        delivered_by: None,
        returned_by: None,
        photo_url: None,
    },
    SeedPass {
        seq: 5,
        department: "Accounts",
        requester: "E. Haque",
        category: "Management",
        purpose: "Return to Vendor",
        driver: "Akbar Ali",
        plate: "DH-GA-99-8877",
        item: ("i6", 1, "Pcs", "Faulty power supply"),
        pass_type: GatePassType::Returnable,
        status: GatePassStatus::Returned,
        created_days: -5,
        due_days: Some(-3),
        returned_days: Some(-1),
        delivered_by: Some(GUARD),
        returned_by: Some("Warehouse Staff"),
        photo_url: None,
    },
];

/// The five demo passes, dated relative to `now` and numbered `GP-<year>-000N`.
pub fn gate_passes(now: DateTime<Utc>) -> Vec<GatePass> {
    let at = |days: i64| now + Duration::days(days);
    PASSES
        .iter()
        .map(|p| {
            let (item_id, quantity, unit, remarks) = p.item;
            GatePass {
                id: format!("gp{}", p.seq),
                gate_pass_no: format!("GP-{}-{:04}", now.year(), p.seq),
                department: p.department.to_string(),
                requester_name: p.requester.to_string(),
                requester_category: p.category.to_string(),
                purpose: p.purpose.to_string(),
                vehicle_info: VehicleInfo {
                    driver_name: p.driver.to_string(),
                    number_plate: p.plate.to_string(),
                },
                items: vec![GatePassItem {
                    item_id: item_id.to_string(),
                    quantity,
                    unit: unit.to_string(),
                    remarks: remarks.to_string(),
                }],
                pass_type: p.pass_type,
                status: p.status,
                created_at: at(p.created_days),
                expected_return_date: p.due_days.map(at),
                returned_at: p.returned_days.map(at),
                approved_by: Some(HEAD.to_string()),
                delivered_by: p.delivered_by.map(str::to_string),
                returned_by: p.returned_by.map(str::to_string),
                photo_url: p.photo_url.map(str::to_string),
            }
        })
        .collect()
}
