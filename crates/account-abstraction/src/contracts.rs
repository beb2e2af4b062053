//! Solidity bindings for the Safe, ERC-4337 and recovery contracts we talk to.

use alloy_sol_types::sol;

sol! {
    interface ISafe {
        function setup(
            address[] calldata owners,
            uint256 threshold,
            address to,
            bytes calldata data,
            address fallbackHandler,
            address paymentToken,
            uint256 payment,
            address paymentReceiver
        ) external;

        function getThreshold() external view returns (uint256);
        function getOwners() external view returns (address[] memory);
        function isModuleEnabled(address module) external view returns (bool);
        function enableModule(address module) external;
        function approveHash(bytes32 hashToApprove) external;
        function addOwnerWithThreshold(address owner, uint256 threshold) external;
        function swapOwner(address prevOwner, address oldOwner, address newOwner) external;
    }

    interface ISafeProxyFactory {
        function createProxyWithNonce(
            address singleton,
            bytes memory initializer,
            uint256 saltNonce
        ) external returns (address proxy);
    }

    interface ISafeModuleSetup {
        function enableModules(address[] calldata modules) external;
    }

    interface ISafe4337Module {
        function executeUserOp(address to, uint256 value, bytes calldata data, uint8 operation) external;
    }

    interface IMultiSend {
        function multiSend(bytes memory transactions) external payable;
    }

    interface IEntryPoint {
        function getNonce(address sender, uint192 key) external view returns (uint256 nonce);
    }

    interface ISafeWebAuthnSharedSigner {
        struct Signer {
            uint256 x;
            uint256 y;
            uint176 verifiers;
        }

        function configure(Signer memory signer) external;
    }

    interface ISafeWebAuthnSignerFactory {
        function createSigner(uint256 x, uint256 y, uint176 verifiers) external returns (address signer);
    }

    interface ISocialRecoveryModule {
        function addGuardianWithThreshold(address guardian, uint256 threshold) external;
        function revokeGuardianWithThreshold(address prevGuardian, address guardian, uint256 threshold) external;
        function getGuardians(address wallet) external view returns (address[] memory);
        function threshold(address wallet) external view returns (uint256);
        function isGuardian(address wallet, address guardian) external view returns (bool);
        function changeThreshold(uint256 threshold) external;
    }

    /// EIP-712 operation signed by Safe owners under the 4337 module.
    struct SafeOp {
        address safe;
        uint256 nonce;
        bytes initCode;
        bytes callData;
        uint128 verificationGasLimit;
        uint128 callGasLimit;
        uint256 preVerificationGas;
        uint128 maxPriorityFeePerGas;
        uint128 maxFeePerGas;
        bytes paymasterAndData;
        uint48 validAfter;
        uint48 validUntil;
        address entryPoint;
    }
}

/// Head of the owner and guardian linked lists.
pub const SENTINEL: alloy_primitives::Address =
    alloy_primitives::address!("0000000000000000000000000000000000000001");
