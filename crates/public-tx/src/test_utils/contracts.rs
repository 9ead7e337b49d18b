use alloy_primitives::{map::HashMap, Address, B256};

use crate::{ContractClass, ContractDeployments, ContractInstance, PublicContractsDb, Tx};

use super::MemoryDbError;

#[derive(Debug, Clone, Default)]
struct Contracts {
    instances: HashMap<Address, ContractInstance>,
    classes: HashMap<B256, ContractClass>,
}

impl Contracts {
    fn add(&mut self, deployments: &ContractDeployments) {
        for class in &deployments.classes {
            self.classes.insert(class.id, class.clone());
        }
        for instance in &deployments.instances {
            self.instances.insert(instance.address, *instance);
        }
    }
}

/// An in-memory [`PublicContractsDb`] with a block-level store and a per-transaction cache.
#[derive(Debug, Clone, Default)]
pub struct MemoryContractsDb {
    block: Contracts,
    tx: Contracts,
}

impl MemoryContractsDb {
    /// Registers a contract class at block level.
    pub fn set_contract_class(&mut self, class: ContractClass) {
        self.block.classes.insert(class.id, class);
    }

    /// Registers a contract class at block level.
    pub fn with_contract_class(mut self, class: ContractClass) -> Self {
        self.set_contract_class(class);
        self
    }

    /// Deploys a contract instance at block level.
    pub fn set_contract_instance(&mut self, instance: ContractInstance) {
        self.block.instances.insert(instance.address, instance);
    }

    /// Deploys a contract instance at block level.
    pub fn with_contract_instance(mut self, instance: ContractInstance) -> Self {
        self.set_contract_instance(instance);
        self
    }

    /// Returns true if `address` is deployed at block level.
    pub fn is_committed(&self, address: Address) -> bool {
        self.block.instances.contains_key(&address)
    }

    /// Returns true if `address` is deployed in the transaction cache.
    pub fn is_pending(&self, address: Address) -> bool {
        self.tx.instances.contains_key(&address)
    }
}

impl PublicContractsDb for MemoryContractsDb {
    type Error = MemoryDbError;

    fn contract_instance(
        &mut self,
        address: Address,
    ) -> Result<Option<ContractInstance>, Self::Error> {
        Ok(self.tx.instances.get(&address).or_else(|| self.block.instances.get(&address)).copied())
    }

    fn contract_class(&mut self, class_id: B256) -> Result<Option<ContractClass>, Self::Error> {
        Ok(self.tx.classes.get(&class_id).or_else(|| self.block.classes.get(&class_id)).cloned())
    }

    fn add_new_non_revertible_contracts(&mut self, tx: &Tx) -> Result<(), Self::Error> {
        self.tx.add(&tx.non_revertible_contracts);
        Ok(())
    }

    fn add_new_revertible_contracts(&mut self, tx: &Tx) -> Result<(), Self::Error> {
        self.tx.add(&tx.revertible_contracts);
        Ok(())
    }

    fn commit_contracts_for_tx(&mut self) -> Result<(), Self::Error> {
        let tx = core::mem::take(&mut self.tx);
        self.block.instances.extend(tx.instances);
        self.block.classes.extend(tx.classes);
        Ok(())
    }

    fn clear_contracts_for_tx(&mut self) {
        self.tx = Contracts::default();
    }
}
