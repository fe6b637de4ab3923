//! PyO3 wrapper for OrderGateway
//!
//! Errors are raised as `ValueError("<Kind>: <message>")`, where `<Kind>` is
//! [`GatewayError::kind`], so Python callers can branch on the prefix.

use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyDict, PyList};

use crate::gateway::{Allocation, GatewayError, LedgerConfig, MigrationRecord, OrderGateway};
use crate::models::account::Account;
use crate::models::event::Event;
use crate::models::seller::SellerRef;

fn to_py_err(e: GatewayError) -> PyErr {
    PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("{}: {}", e.kind(), e))
}

fn parse_config(config_json: Option<&str>) -> PyResult<LedgerConfig> {
    match config_json {
        Some(json) => LedgerConfig::from_json(json).map_err(|e| to_py_err(e.into())),
        None => Ok(LedgerConfig::default()),
    }
}

/// Extract a required field from a Python dict with clear error messages.
fn extract_required<'py, T>(dict: &Bound<'py, PyDict>, key: &str) -> PyResult<T>
where
    T: FromPyObject<'py>,
{
    dict.get_item(key)?
        .ok_or_else(|| {
            PyErr::new::<pyo3::exceptions::PyValueError, _>(format!(
                "Missing required field '{}'",
                key
            ))
        })?
        .extract()
}

/// Convert one allocation dict (`seller_id` or `seller_address`,
/// `seller_value`, `business_value`, optional `payload` bytes)
fn parse_allocation(dict: &Bound<'_, PyDict>) -> PyResult<Allocation> {
    let seller = match dict.get_item("seller_id")? {
        Some(id) => SellerRef::Id(id.extract()?),
        None => SellerRef::Address(extract_required(dict, "seller_address")?),
    };
    let payload: Vec<u8> = match dict.get_item("payload")? {
        Some(value) => value.extract()?,
        None => Vec::new(),
    };
    Ok(Allocation::new(
        seller,
        extract_required(dict, "seller_value")?,
        extract_required(dict, "business_value")?,
    )
    .with_payload(payload))
}

fn account_to_py(py: Python<'_>, account: &Account) -> PyResult<Py<PyDict>> {
    let dict = PyDict::new_bound(py);
    dict.set_item("id", account.id())?;
    dict.set_item("address", account.address())?;
    dict.set_item("parent_id", account.parent_id())?;
    dict.set_item("position", account.position())?;
    dict.set_item("path", PyBytes::new_bound(py, account.path()))?;
    dict.set_item("children", account.children().to_vec())?;
    dict.set_item("bv", account.bv())?;
    dict.set_item("children_safe_bv", account.children_safe_bv().to_vec())?;
    dict.set_item("children_aggregate_bv", account.children_aggregate_bv().to_vec())?;
    dict.set_item("commission_earned", account.commission_earned())?;
    Ok(dict.unbind())
}

/// Python wrapper for the commission ledger
///
/// # Example (from Python)
///
/// ```python
/// from commission_ledger_core_rs import Ledger
///
/// ledger = Ledger()
/// seller = ledger.register_seller("0xshop")
/// ledger.migrate_user("0xroot", None, 0)
/// ids = ledger.create_order("0xbuyer", "0xroot", 1,
///     [{"seller_id": seller, "seller_value": 900, "business_value": 2000}],
///     1704067200)
/// print(ledger.get_user_path(2))
/// ```
#[pyclass(name = "Ledger")]
pub struct PyLedger {
    inner: OrderGateway,
}

#[pymethods]
impl PyLedger {
    /// Create an empty ledger from an optional JSON config
    #[new]
    #[pyo3(signature = (config_json=None))]
    fn new(config_json: Option<&str>) -> PyResult<Self> {
        let inner = OrderGateway::new(parse_config(config_json)?).map_err(to_py_err)?;
        Ok(PyLedger { inner })
    }

    /// Restore a ledger from `save_state` output
    #[staticmethod]
    #[pyo3(signature = (state_json, config_json=None))]
    fn load_state(state_json: &str, config_json: Option<&str>) -> PyResult<Self> {
        let inner =
            OrderGateway::load_state(parse_config(config_json)?, state_json).map_err(to_py_err)?;
        Ok(PyLedger { inner })
    }

    fn save_state(&self) -> PyResult<String> {
        self.inner.save_state().map_err(to_py_err)
    }

    fn register_seller(&mut self, address: &str) -> PyResult<u64> {
        self.inner.register_seller(address).map_err(to_py_err)
    }

    /// Place one account, optionally with historical counters
    #[pyo3(signature = (user_address, parent_address, position, bv=0, children_safe_bv=None, children_aggregate_bv=None))]
    fn migrate_user(
        &mut self,
        user_address: &str,
        parent_address: Option<&str>,
        position: u8,
        bv: i64,
        children_safe_bv: Option<[i64; 4]>,
        children_aggregate_bv: Option<[i64; 4]>,
    ) -> PyResult<u64> {
        let mut record = MigrationRecord::new(user_address, parent_address, position);
        record.bv = bv;
        record.children_safe_bv = children_safe_bv.unwrap_or_default();
        record.children_aggregate_bv = children_aggregate_bv.unwrap_or_default();
        self.inner.migrate_user(&record).map_err(to_py_err)
    }

    /// Place a batch of accounts from a JSON array of migration records
    fn migrate_users(&mut self, records_json: &str) -> PyResult<Vec<u64>> {
        let records: Vec<MigrationRecord> = serde_json::from_str(records_json).map_err(|e| {
            PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("Invalid records: {}", e))
        })?;
        self.inner.migrate_users(&records).map_err(to_py_err)
    }

    /// Submit allocations for a buyer; returns the created order ids
    fn create_order(
        &mut self,
        buyer_address: &str,
        parent_address: Option<&str>,
        position: u8,
        allocations: &Bound<'_, PyList>,
        timestamp: i64,
    ) -> PyResult<Vec<u64>> {
        let allocations = allocations
            .iter()
            .map(|item| parse_allocation(item.downcast::<PyDict>()?))
            .collect::<PyResult<Vec<_>>>()?;
        self.inner
            .create_order(buyer_address, parent_address, position, &allocations, timestamp)
            .map_err(to_py_err)
    }

    fn activate_weekly_mode(&mut self, timestamp: i64) -> PyResult<i64> {
        self.inner.activate_weekly_mode(timestamp).map_err(to_py_err)
    }

    fn set_max_steps(&mut self, max_steps: u32) {
        self.inner.set_max_steps(max_steps);
    }

    fn get_user_by_id(&self, py: Python<'_>, id: u64) -> PyResult<Option<Py<PyDict>>> {
        self.inner
            .get_user_by_id(id)
            .map(|account| account_to_py(py, account))
            .transpose()
    }

    fn get_user_by_address(&self, py: Python<'_>, address: &str) -> PyResult<Option<Py<PyDict>>> {
        self.inner
            .get_user_by_address(address)
            .map(|account| account_to_py(py, account))
            .transpose()
    }

    fn get_user_path(&self, py: Python<'_>, id: u64) -> Option<Py<PyBytes>> {
        self.inner
            .get_user_path(id)
            .map(|path| PyBytes::new_bound(py, path).unbind())
    }

    /// Logged events as a JSON array, optionally only those naming `account_id`
    #[pyo3(signature = (account_id=None))]
    fn events_json(&self, account_id: Option<u64>) -> PyResult<String> {
        let log = self.inner.event_log();
        let events: Vec<&Event> = match account_id {
            Some(id) => log.events_for_account(id),
            None => log.events().iter().collect(),
        };
        serde_json::to_string(&events).map_err(|e| {
            PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!(
                "Event serialization failed: {}",
                e
            ))
        })
    }
}
